use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Subdirectory of the media root holding post images
pub const POST_IMAGE_DIR: &str = "posts";

const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// Lower-cased extension of an uploaded file name, if it is an accepted image type
pub fn image_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Relative path for a newly uploaded image. The client's file name is
/// never reused, only its extension.
pub fn new_image_path(ext: &str) -> String {
    format!("{}/{}.{}", POST_IMAGE_DIR, Uuid::new_v4(), ext)
}

fn absolute(media_root: &str, relative: &str) -> PathBuf {
    Path::new(media_root).join(relative)
}

/// Write `bytes` under the media root and return the stored relative path
pub async fn save_image(media_root: &str, ext: &str, bytes: &[u8]) -> std::io::Result<String> {
    let relative = new_image_path(ext);
    let target = absolute(media_root, &relative);
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&target, bytes).await?;
    Ok(relative)
}

/// Remove a previously stored image; a missing file is not an error
pub async fn remove_image(media_root: &str, relative: &str) -> std::io::Result<()> {
    match tokio::fs::remove_file(absolute(media_root, relative)).await {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_image_extensions_are_accepted() {
        assert_eq!(image_extension("cat.PNG").as_deref(), Some("png"));
        assert_eq!(image_extension("photo.jpeg").as_deref(), Some("jpeg"));
        assert_eq!(image_extension("script.sh"), None);
        assert_eq!(image_extension("noext"), None);
    }

    #[test]
    fn generated_paths_live_under_post_dir() {
        let path = new_image_path("png");
        assert!(path.starts_with("posts/"));
        assert!(path.ends_with(".png"));
        assert_ne!(path, new_image_path("png"));
    }

    #[tokio::test]
    async fn save_then_remove_image() {
        let root = std::env::temp_dir().join(format!("blogicum-media-{}", Uuid::new_v4()));
        let root = root.to_str().unwrap().to_string();

        let relative = save_image(&root, "gif", b"GIF89a").await.unwrap();
        let stored = tokio::fs::read(Path::new(&root).join(&relative)).await.unwrap();
        assert_eq!(stored, b"GIF89a");

        remove_image(&root, &relative).await.unwrap();
        // second removal is a no-op
        remove_image(&root, &relative).await.unwrap();

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
