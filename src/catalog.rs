//! Department → profession taxonomy and experience bands.
//!
//! The catalog is immutable for the life of the process. A built-in default
//! ships with the crate; a JSON file with the same shape can replace it at
//! startup.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// A department and its ordered professions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub name: String,
    pub professions: Vec<String>,
}

/// The full taxonomy used to validate wizard input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub departments: Vec<Department>,
    pub experience_bands: Vec<String>,
}

impl Catalog {
    /// Load and validate a catalog from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_json::from_str(raw)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Check names are non-empty and unique where lookups depend on it.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.departments.is_empty() {
            return Err(CatalogError::Invalid("no departments".into()));
        }
        if self.experience_bands.is_empty() {
            return Err(CatalogError::Invalid("no experience bands".into()));
        }

        let mut seen = HashSet::new();
        for dept in &self.departments {
            if dept.name.trim().is_empty() {
                return Err(CatalogError::Invalid("empty department name".into()));
            }
            if !seen.insert(dept.name.as_str()) {
                return Err(CatalogError::Invalid(format!(
                    "duplicate department '{}'",
                    dept.name
                )));
            }
            if dept.professions.is_empty() {
                return Err(CatalogError::Invalid(format!(
                    "department '{}' has no professions",
                    dept.name
                )));
            }
            let mut profs = HashSet::new();
            for prof in &dept.professions {
                if prof.trim().is_empty() || !profs.insert(prof.as_str()) {
                    return Err(CatalogError::Invalid(format!(
                        "bad profession '{prof}' in department '{}'",
                        dept.name
                    )));
                }
            }
        }

        let mut bands = HashSet::new();
        for band in &self.experience_bands {
            if band.trim().is_empty() || !bands.insert(band.as_str()) {
                return Err(CatalogError::Invalid(format!("bad experience band '{band}'")));
            }
        }
        Ok(())
    }

    pub fn department_index(&self, name: &str) -> Option<usize> {
        self.departments.iter().position(|d| d.name == name)
    }

    pub fn department(&self, name: &str) -> Option<&Department> {
        self.departments.iter().find(|d| d.name == name)
    }

    pub fn department_at(&self, index: usize) -> Option<&Department> {
        self.departments.get(index)
    }

    /// Whether `profession` belongs to `department`.
    pub fn contains_profession(&self, department: &str, profession: &str) -> bool {
        self.department(department)
            .is_some_and(|d| d.professions.iter().any(|p| p == profession))
    }

    pub fn experience_band_at(&self, index: usize) -> Option<&str> {
        self.experience_bands.get(index).map(String::as_str)
    }

    pub fn contains_experience_band(&self, band: &str) -> bool {
        self.experience_bands.iter().any(|b| b == band)
    }
}

fn dept(name: &str, professions: &[&str]) -> Department {
    Department {
        name: name.to_string(),
        professions: professions.iter().map(|p| p.to_string()).collect(),
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            departments: vec![
                dept(
                    "Directing",
                    &[
                        "Film directors",
                        "Animation directors",
                        "First assistant directors",
                        "Second assistant directors",
                        "Casting assistants",
                        "Director's assistants",
                        "Background crowd supervisors",
                        "Casting directors",
                    ],
                ),
                dept("Sound", &["Sound engineers", "Sound assistants"]),
                dept(
                    "Camera",
                    &[
                        "Second unit operators",
                        "Camera operators",
                        "Focus pullers",
                        "Drone operators and pilots",
                        "Lighting technicians",
                        "Grips",
                        "Gaffers",
                    ],
                ),
                dept(
                    "Art department",
                    &[
                        "Production designers",
                        "Production design assistants",
                        "Set decorators",
                        "Set dressers",
                    ],
                ),
                dept(
                    "Props",
                    &["Prop masters", "Prop assistants", "Prop handlers"],
                ),
                dept(
                    "Makeup",
                    &[
                        "Makeup designers",
                        "Makeup assistants",
                        "Makeup artists",
                        "Wig makers",
                    ],
                ),
                dept(
                    "Costume",
                    &[
                        "Costume designers",
                        "Costume assistants",
                        "Costume breakdown artists",
                        "Dressers",
                    ],
                ),
                dept(
                    "Cast",
                    &[
                        "Lead actors",
                        "Supporting actors",
                        "Bit-part actors",
                        "Stand-ins",
                        "Extras",
                        "Group extras",
                        "Crowd scene actors",
                    ],
                ),
                dept(
                    "Production",
                    &[
                        "Film and TV producers",
                        "Animation producers",
                        "Executive producers",
                        "Line producers",
                        "Producer assistants",
                        "Location managers",
                    ],
                ),
                dept(
                    "Administration",
                    &[
                        "Production managers",
                        "Deputy production managers",
                        "Health and safety officers",
                        "Unit and set administrators",
                        "Coordinators",
                        "Crew hands",
                        "Catering",
                    ],
                ),
                dept("Transport", &["Drivers"]),
                dept(
                    "Stunts and pyrotechnics",
                    &["Stunt coordinators", "Stunt performers", "Pyrotechnicians"],
                ),
                dept("Script supervision", &["Script supervisors"]),
                dept(
                    "Editing",
                    &["Film editors", "Assistant editors", "Editors", "Loggers"],
                ),
                dept(
                    "Animation",
                    &[
                        "Animation production designers",
                        "Concept artists",
                        "Character artists",
                        "Background artists",
                        "Animatic directors",
                        "Animatic artists",
                        "Layout artists",
                        "Animators",
                        "Clean-up artists",
                        "Colorists",
                        "2D animators (cut-out/hybrid/bone)",
                        "2D riggers",
                        "3D animators",
                        "Stop-motion animators",
                        "3D riggers",
                        "Modelers",
                        "3D layout artists",
                        "Compositors",
                        "Lighting artists",
                        "Render artists",
                    ],
                ),
            ],
            experience_bands: vec![
                "No experience".to_string(),
                "Under 1 year".to_string(),
                "1-3 years".to_string(),
                "3-5 years".to_string(),
                "5+ years".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_is_valid() {
        Catalog::default().validate().unwrap();
    }

    #[test]
    fn profession_membership_is_per_department() {
        let catalog = Catalog::default();
        assert!(catalog.contains_profession("Sound", "Sound engineers"));
        assert!(!catalog.contains_profession("Camera", "Sound engineers"));
        assert!(!catalog.contains_profession("Nonexistent", "Sound engineers"));
    }

    #[test]
    fn lookups_by_index() {
        let catalog = Catalog::default();
        assert_eq!(catalog.department_at(1).unwrap().name, "Sound");
        assert_eq!(catalog.department_index("Sound"), Some(1));
        assert!(catalog.department_at(999).is_none());
        assert_eq!(catalog.experience_band_at(4), Some("5+ years"));
        assert!(catalog.experience_band_at(5).is_none());
    }

    #[test]
    fn json_roundtrip_through_loader() {
        let json = serde_json::to_string(&Catalog::default()).unwrap();
        let loaded = Catalog::from_json_str(&json).unwrap();
        assert_eq!(loaded, Catalog::default());
    }

    #[test]
    fn rejects_duplicate_departments() {
        let json = r#"{
            "departments": [
                {"name": "Sound", "professions": ["Boom operators"]},
                {"name": "Sound", "professions": ["Mixers"]}
            ],
            "experience_bands": ["Any"]
        }"#;
        let err = Catalog::from_json_str(json).unwrap_err();
        assert!(matches!(err, CatalogError::Invalid(_)));
    }

    #[test]
    fn rejects_department_without_professions() {
        let json = r#"{
            "departments": [{"name": "Sound", "professions": []}],
            "experience_bands": ["Any"]
        }"#;
        assert!(Catalog::from_json_str(json).is_err());
    }

    #[test]
    fn reads_catalog_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"{"departments":[{"name":"Grip","professions":["Key grips"]}],"experience_bands":["Junior","Senior"]}"#,
        )
        .unwrap();

        let catalog = Catalog::from_json_file(&path).unwrap();
        assert!(catalog.contains_profession("Grip", "Key grips"));
        assert!(catalog.contains_experience_band("Senior"));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = Catalog::from_json_file(Path::new("/nonexistent/catalog.json")).unwrap_err();
        assert!(matches!(err, CatalogError::Read { .. }));
    }
}
