//! Read-only catalog of the ambient tracks a mixer can play.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MixerError, Result};

/// Broad grouping used by the presentation layer for browsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Nature,
    Water,
    Fire,
    Urban,
    Noise,
    Other,
}

impl Category {
    /// Name as written in catalog files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Nature => "nature",
            Category::Water => "water",
            Category::Fire => "fire",
            Category::Urban => "urban",
            Category::Noise => "noise",
            Category::Other => "other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of one playable track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    /// Stable identifier used by every mixer intent.
    pub id: String,
    pub display_name: String,
    /// Resource handed to the playback backend, usually a file name.
    pub resource_ref: String,
    pub category: Category,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub theme_color: String,
}

impl TrackDescriptor {
    pub fn new(id: &str, display_name: &str, resource_ref: &str, category: Category) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            resource_ref: resource_ref.to_string(),
            category,
            description: String::new(),
            theme_color: String::new(),
        }
    }
}

/// Ordered list of track descriptors keyed by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    tracks: Vec<TrackDescriptor>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate or empty ids.
    pub fn new(tracks: Vec<TrackDescriptor>) -> Result<Self> {
        let mut seen = HashSet::new();
        for track in &tracks {
            if track.id.is_empty() {
                return Err(MixerError::Config("track id must not be empty".to_string()));
            }
            if !seen.insert(track.id.as_str()) {
                return Err(MixerError::Config(format!(
                    "duplicate track id '{}'",
                    track.id
                )));
            }
        }
        Ok(Self { tracks })
    }

    /// Parse a JSON array of track descriptors.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let tracks: Vec<TrackDescriptor> = serde_json::from_str(json)?;
        Self::new(tracks)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// The default ambient sound set.
    pub fn builtin() -> Self {
        let tracks = BUILTIN_TRACKS
            .iter()
            .map(|(id, name, category, description, color)| TrackDescriptor {
                id: id.to_string(),
                display_name: name.to_string(),
                resource_ref: format!("{}.mp3", id),
                category: *category,
                description: description.to_string(),
                theme_color: color.to_string(),
            })
            .collect();
        Self { tracks }
    }

    pub fn get(&self, id: &str) -> Option<&TrackDescriptor> {
        self.tracks.iter().find(|track| track.id == id)
    }

    pub fn tracks(&self) -> &[TrackDescriptor] {
        &self.tracks
    }

    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &TrackDescriptor> {
        self.tracks
            .iter()
            .filter(move |track| track.category == category)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

const BUILTIN_TRACKS: &[(&str, &str, Category, &str, &str)] = &[
    ("rain", "Rain", Category::Water, "Steady rain on a rooftop", "#4A6FA5"),
    ("waves", "Ocean Waves", Category::Water, "Waves rolling onto the shore", "#2E86AB"),
    ("stream", "Forest Stream", Category::Water, "A shallow creek over stones", "#3D9970"),
    ("thunder", "Thunderstorm", Category::Water, "Distant rolling thunder", "#5C5470"),
    ("fireplace", "Fireplace", Category::Fire, "Crackling logs in a hearth", "#D9534F"),
    ("forest", "Forest", Category::Nature, "Leaves and distant wildlife", "#2D6A4F"),
    ("wind", "Wind", Category::Nature, "Wind through tall grass", "#8D99AE"),
    ("birds", "Birdsong", Category::Nature, "Morning birds in the trees", "#F4A261"),
    ("cafe", "Cafe", Category::Urban, "Quiet chatter and cups", "#8B5E3C"),
    ("white_noise", "White Noise", Category::Noise, "Flat broadband noise", "#B0B0B0"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_has_unique_ids() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.len(), BUILTIN_TRACKS.len());
        assert!(Catalog::new(catalog.tracks().to_vec()).is_ok());

        let rain = catalog.get("rain").unwrap();
        assert_eq!(rain.resource_ref, "rain.mp3");
        assert_eq!(rain.category, Category::Water);
    }

    #[test]
    fn category_names_match_serialized_form() {
        for category in [Category::Nature, Category::Noise, Category::Other] {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category));
        }
    }

    #[test]
    fn filters_by_category_in_catalog_order() {
        let catalog = Catalog::builtin();
        let water: Vec<&str> = catalog
            .by_category(Category::Water)
            .map(|track| track.id.as_str())
            .collect();
        assert_eq!(water, vec!["rain", "waves", "stream", "thunder"]);
    }

    #[test]
    fn parses_json_with_optional_fields_missing() {
        let json = r##"[
            {"id": "rain", "display_name": "Rain", "resource_ref": "rain.ogg", "category": "water"},
            {"id": "fire", "display_name": "Fire", "resource_ref": "fire.ogg", "category": "fire",
             "description": "warm", "theme_color": "#f00"}
        ]"##;
        let catalog = Catalog::from_json_str(json).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("rain").unwrap().description, "");
        assert_eq!(catalog.get("fire").unwrap().theme_color, "#f00");
        assert!(catalog.get("waves").is_none());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let tracks = vec![
            TrackDescriptor::new("rain", "Rain", "rain.ogg", Category::Water),
            TrackDescriptor::new("rain", "More Rain", "rain2.ogg", Category::Water),
        ];
        assert!(matches!(Catalog::new(tracks), Err(MixerError::Config(_))));
    }

    #[test]
    fn rejects_unknown_categories() {
        let json = r#"[{"id": "x", "display_name": "X", "resource_ref": "x", "category": "space"}]"#;
        assert!(matches!(
            Catalog::from_json_str(json),
            Err(MixerError::Config(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"[{"id": "cafe", "display_name": "Cafe", "resource_ref": "cafe.mp3", "category": "urban"}]"#,
        )
        .unwrap();

        let catalog = Catalog::from_json_file(&path).unwrap();
        assert_eq!(catalog.tracks()[0].id, "cafe");
        assert!(matches!(
            Catalog::from_json_file(dir.path().join("missing.json")),
            Err(MixerError::Io(_))
        ));
    }
}
