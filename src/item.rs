use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Similarity score given to the reference image of a similarity search,
/// so it always ranks above every real match.
pub const REFERENCE_SIMILARITY: f64 = 1.1;

/// A media item as provided by the item-info layer. The sort, grouping and
/// correlation code only ever reads these.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub folder_path: String,
    /// Capture time in the camera's local clock.
    #[serde(default)]
    pub taken: Option<NaiveDateTime>,
    #[serde(default)]
    pub modified: Option<NaiveDateTime>,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub rating: i32,
    #[serde(default)]
    pub pick_label: i32,
    #[serde(default)]
    pub color_label: i32,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub download_state: i32,
    #[serde(default)]
    pub manual_order: i64,
    #[serde(default)]
    pub unconfirmed_faces: u32,
    #[serde(default)]
    pub similarity: f64,
    #[serde(default)]
    pub reference_image_id: Option<i64>,
}

impl ItemRecord {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self { id, name: name.into(), ..Default::default() }
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder_path = folder.into();
        self
    }

    pub fn with_taken(mut self, taken: NaiveDateTime) -> Self {
        self.taken = Some(taken);
        self
    }

    pub fn with_size(mut self, bytes: u64) -> Self {
        self.file_size = bytes;
        self
    }

    pub fn with_rating(mut self, rating: i32) -> Self {
        self.rating = rating;
        self
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = mime.into();
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Folder and name joined with a single `/`.
    pub fn file_path(&self) -> String {
        if self.folder_path.is_empty() {
            return self.name.clone();
        }
        format!("{}/{}", self.folder_path.trim_end_matches('/'), self.name)
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Width over height, 0.0 for items without known dimensions.
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }

    pub fn effective_similarity(&self) -> f64 {
        if self.reference_image_id == Some(self.id) {
            REFERENCE_SIMILARITY
        } else {
            self.similarity
        }
    }
}
