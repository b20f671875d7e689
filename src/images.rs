pub const IMAGE_BASE: &str = "https://image.tmdb.org/t/p";
pub const PLACEHOLDER_POSTER: &str = "/assets/placeholder-poster.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSize {
    W92,
    W185,
    W342,
    W500,
    W780,
    Original,
}

impl ImageSize {
    pub fn token(&self) -> &'static str {
        match self {
            ImageSize::W92 => "w92",
            ImageSize::W185 => "w185",
            ImageSize::W342 => "w342",
            ImageSize::W500 => "w500",
            ImageSize::W780 => "w780",
            ImageSize::Original => "original",
        }
    }
}

/// Card posters.
pub fn poster_url(path: Option<&str>) -> String {
    image_url(path, ImageSize::W500).unwrap_or_else(|| PLACEHOLDER_POSTER.to_string())
}

/// `None` when the API gave no usable path fragment.
pub fn image_url(path: Option<&str>, size: ImageSize) -> Option<String> {
    let path = path.map(str::trim).filter(|p| !p.is_empty())?;
    let path = path.trim_start_matches('/');
    Some(format!("{IMAGE_BASE}/{}/{path}", size.token()))
}
