use bytes::Bytes;
use std::path::Path;

/// Image MIME types accepted by the optimize endpoints.
pub const ALLOWED_IMAGE_MIMES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/avif",
];

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// An upload that passed the intake pipeline.
#[derive(Debug, Clone)]
pub struct ValidatedImage {
    pub filename: String,
    pub mime: String,
    pub bytes: Bytes,
}

/// Strips parameters and casing from a Content-Type header, and folds the
/// `image/jpg` alias browsers still send into `image/jpeg`.
pub fn normalize_mime(content_type: &str) -> String {
    let essence = content_type
        .parse::<mime::Mime>()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|_| {
            content_type
                .split(';')
                .next()
                .unwrap_or("")
                .trim()
                .to_lowercase()
        });

    match essence.as_str() {
        "image/jpg" => "image/jpeg".to_string(),
        _ => essence,
    }
}

/// Validates the declared MIME type against the image allowlist and returns
/// the normalized form.
pub fn validate_image_mime(content_type: &str) -> Result<String, ValidationError> {
    let normalized = normalize_mime(content_type);

    if ALLOWED_IMAGE_MIMES.contains(&normalized.as_str()) {
        return Ok(normalized);
    }

    Err(ValidationError {
        code: "INVALID_MIME_TYPE",
        message: format!(
            "File type '{}' is not supported. Only JPEG, PNG, WebP and AVIF are accepted.",
            content_type
        ),
    })
}

/// Validates file size against the configured ceiling.
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ValidationError> {
    if size == 0 {
        return Err(ValidationError {
            code: "EMPTY_FILE",
            message: "File appears to be empty".to_string(),
        });
    }
    if size > max_size {
        return Err(ValidationError {
            code: "FILE_TOO_LARGE",
            message: format!(
                "File size {} bytes exceeds maximum allowed {} bytes ({} MB)",
                size,
                max_size,
                max_size / 1024 / 1024
            ),
        });
    }
    Ok(())
}

/// Sanitizes a caller-supplied filename: strips path components, replaces
/// reserved characters, and caps the length.
pub fn sanitize_filename(filename: &str) -> Result<String, ValidationError> {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if name.is_empty() {
        return Err(ValidationError {
            code: "INVALID_FILENAME",
            message: "Filename cannot be empty".to_string(),
        });
    }

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path traversal attempt detected: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ';')
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Cap at 255 bytes on a UTF-8 boundary
    let sanitized = if sanitized.len() > 255 {
        let mut end = 255;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    if sanitized.starts_with('.') {
        return Err(ValidationError {
            code: "HIDDEN_FILE",
            message: "Hidden files (starting with '.') are not allowed".to_string(),
        });
    }

    Ok(sanitized)
}

/// Sniffs the leading bytes: content that is identifiably something other
/// than an image is rejected. Unrecognized content is allowed through and
/// left for the decoder to judge.
pub fn sniff_image_content(bytes: &[u8]) -> Result<(), ValidationError> {
    let Some(kind) = infer::get(bytes) else {
        tracing::debug!("No magic-byte match for upload, allowing anyway");
        return Ok(());
    };

    if kind.matcher_type() != infer::MatcherType::Image {
        return Err(ValidationError {
            code: "NOT_AN_IMAGE",
            message: format!("File content detected as '{}', not an image", kind.mime_type()),
        });
    }

    Ok(())
}

/// Full intake pipeline for an uploaded image.
pub fn validate_image_upload(
    filename: &str,
    content_type: Option<&str>,
    bytes: Bytes,
    max_size: usize,
) -> Result<ValidatedImage, ValidationError> {
    validate_file_size(bytes.len(), max_size)?;

    let sanitized = sanitize_filename(filename)?;

    let mime = content_type.unwrap_or("application/octet-stream");
    let normalized = validate_image_mime(mime)?;

    sniff_image_content(&bytes)?;

    Ok(ValidatedImage {
        filename: sanitized,
        mime: normalized,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mime() {
        assert_eq!(normalize_mime("image/jpeg"), "image/jpeg");
        assert_eq!(normalize_mime("IMAGE/PNG"), "image/png");
        assert_eq!(normalize_mime("image/jpg"), "image/jpeg");
        assert_eq!(normalize_mime("image/webp; charset=binary"), "image/webp");
    }

    #[test]
    fn test_validate_image_mime() {
        assert!(validate_image_mime("image/jpeg").is_ok());
        assert!(validate_image_mime("image/jpg").is_ok());
        assert!(validate_image_mime("image/png").is_ok());
        assert!(validate_image_mime("image/webp").is_ok());
        assert!(validate_image_mime("image/avif").is_ok());

        assert!(validate_image_mime("image/gif").is_err());
        assert!(validate_image_mime("application/pdf").is_err());
        assert!(validate_image_mime("text/html").is_err());
    }

    #[test]
    fn test_validate_file_size() {
        assert!(validate_file_size(1024, 30 * 1024 * 1024).is_ok());
        assert!(validate_file_size(30 * 1024 * 1024, 30 * 1024 * 1024).is_ok());
        assert!(validate_file_size(30 * 1024 * 1024 + 1, 30 * 1024 * 1024).is_err());
        assert!(validate_file_size(0, 30 * 1024 * 1024).is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("photo.jpg").unwrap(), "photo.jpg");
        assert_eq!(sanitize_filename("my picture.png").unwrap(), "my picture.png");
        assert_eq!(
            sanitize_filename("shot<1>.webp").unwrap(),
            "shot_1_.webp"
        );
        assert_eq!(sanitize_filename("写真.png").unwrap(), "写真.png");

        // Path traversal
        assert_eq!(
            sanitize_filename("../../../etc/passwd").unwrap(),
            "passwd"
        );
        assert_eq!(
            sanitize_filename("..\\..\\windows\\img.png").unwrap(),
            "img.png"
        );

        // Hidden files
        assert!(sanitize_filename(".htaccess").is_err());
        assert!(sanitize_filename("").is_err());
    }

    #[test]
    fn test_sniff_image_content() {
        // PNG signature
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00];
        assert!(sniff_image_content(&png).is_ok());

        // JPEG signature
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];
        assert!(sniff_image_content(&jpeg).is_ok());

        // PDF disguised as an image
        assert!(sniff_image_content(b"%PDF-1.5 something").is_err());

        // ELF binary
        assert!(sniff_image_content(&[0x7F, 0x45, 0x4C, 0x46, 0x02, 0x01]).is_err());

        // Unrecognized bytes are left for the decoder
        assert!(sniff_image_content(b"just some text").is_ok());
    }

    #[test]
    fn test_validate_image_upload() {
        let png = Bytes::from_static(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00]);

        let ok = validate_image_upload("a.png", Some("image/png"), png.clone(), 1024).unwrap();
        assert_eq!(ok.filename, "a.png");
        assert_eq!(ok.mime, "image/png");

        // Declared type not in the allowlist
        assert!(validate_image_upload("a.gif", Some("image/gif"), png.clone(), 1024).is_err());

        // Over the ceiling
        assert!(validate_image_upload("a.png", Some("image/png"), png, 4).is_err());
    }
}
