//! Display helpers for movie data.

/// Truncate to `max_chars` characters, adding "..." if anything was cut.
pub fn truncate(s: &str, max_chars: usize) -> String {
  match s.char_indices().nth(max_chars) {
    None => s.to_string(),
    Some((end, _)) => format!("{}...", &s[..end]),
  }
}

/// Rating with one decimal place.
pub fn format_rating(rating: f64) -> String {
  format!("{:.1}", rating)
}

/// Year part of an ISO date, empty when unknown.
pub fn year(date: &str) -> &str {
  date.split('-').next().unwrap_or_default()
}

/// Runtime as `2h 30min`, `1h` or `45min`. Empty for none or zero.
pub fn format_runtime(minutes: Option<u32>) -> String {
  let minutes = match minutes {
    Some(m) if m > 0 => m,
    _ => return String::new(),
  };

  let (hours, mins) = (minutes / 60, minutes % 60);
  match (hours, mins) {
    (0, m) => format!("{}min", m),
    (h, 0) => format!("{}h", h),
    (h, m) => format!("{}h {}min", h, m),
  }
}

/// Integer with thousands separators: `1,234,567`.
pub fn format_number(value: u64) -> String {
  let digits = value.to_string();
  let mut out = String::with_capacity(digits.len() + digits.len() / 3);
  for (i, c) in digits.chars().enumerate() {
    if i > 0 && (digits.len() - i) % 3 == 0 {
      out.push(',');
    }
    out.push(c);
  }
  out
}

/// Whole US dollars: `$1,234,567`.
pub fn format_currency(value: u64) -> String {
  format!("${}", format_number(value))
}

pub const POSTER_PLACEHOLDER: &str =
  "https://via.placeholder.com/342x513/1f2937/9ca3af?text=No+Poster";
pub const BACKDROP_PLACEHOLDER: &str =
  "https://via.placeholder.com/1280x720/1f2937/9ca3af?text=No+Image";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PosterSize {
  Small,
  #[default]
  Medium,
  Large,
  Original,
}

impl PosterSize {
  fn as_str(&self) -> &'static str {
    match self {
      PosterSize::Small => "w185",
      PosterSize::Medium => "w342",
      PosterSize::Large => "w500",
      PosterSize::Original => "original",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackdropSize {
  Small,
  Medium,
  #[default]
  Large,
  Original,
}

impl BackdropSize {
  fn as_str(&self) -> &'static str {
    match self {
      BackdropSize::Small => "w300",
      BackdropSize::Medium => "w780",
      BackdropSize::Large => "w1280",
      BackdropSize::Original => "original",
    }
  }
}

fn image_url(base: &str, size: &str, path: Option<&str>) -> Option<String> {
  let path = path.filter(|p| !p.is_empty())?;
  Some(format!("{}/{}{}", base.trim_end_matches('/'), size, path))
}

pub fn poster_url(base: &str, path: Option<&str>, size: PosterSize) -> Option<String> {
  image_url(base, size.as_str(), path)
}

pub fn backdrop_url(base: &str, path: Option<&str>, size: BackdropSize) -> Option<String> {
  image_url(base, size.as_str(), path)
}

pub fn poster_url_or_placeholder(base: &str, path: Option<&str>, size: PosterSize) -> String {
  poster_url(base, path, size).unwrap_or_else(|| POSTER_PLACEHOLDER.to_string())
}

pub fn backdrop_url_or_placeholder(base: &str, path: Option<&str>, size: BackdropSize) -> String {
  backdrop_url(base, path, size).unwrap_or_else(|| BACKDROP_PLACEHOLDER.to_string())
}
