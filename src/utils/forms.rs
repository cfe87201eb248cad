use chrono::{DateTime, NaiveDateTime, Utc};
use validator::ValidationError;

/// Accepted `pub_date` input formats, tried in order after RFC 3339.
/// Naive values are taken as UTC.
const PUB_DATE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%d.%m.%Y %H:%M"];

/// Format used to pre-fill the `datetime-local` input
const PUB_DATE_INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M";

pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    PUB_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

pub fn format_pub_date(value: DateTime<Utc>) -> String {
    value.format(PUB_DATE_INPUT_FORMAT).to_string()
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

pub fn validate_pub_date(value: &String) -> Result<(), ValidationError> {
    match parse_pub_date(value) {
        Some(_) => Ok(()),
        None => Err(invalid("invalid_pub_date", "Enter a valid date and time.")),
    }
}

/// Names that would collide with a fixed path segment under /profile/
const RESERVED_USERNAMES: [&str; 3] = ["edit", ".", ".."];

/// ASCII letters, digits and `@.+-_`; usernames end up in redirect URLs
pub fn validate_username(value: &String) -> Result<(), ValidationError> {
    if RESERVED_USERNAMES.contains(&value.as_str()) {
        return Err(invalid("reserved_username", "This username is not available."));
    }
    let ok = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));
    if ok {
        Ok(())
    } else {
        Err(invalid(
            "invalid_username",
            "Username may contain only letters, digits and @/./+/-/_ characters.",
        ))
    }
}

/// Latin letters, digits, hyphen and underscore
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Only local absolute paths are followed after login; anything else
/// (other hosts, scheme-relative `//host`) falls back to the index.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(char::is_control) =>
        {
            path
        }
        _ => "/",
    }
}

/// Checkbox semantics: present with a truthy value means checked
pub fn parse_checkbox(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "on" | "true" | "1" | "yes")
}

/// Empty select means "no choice"
pub fn parse_optional_id(value: &str) -> Result<Option<i64>, std::num::ParseIntError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value.parse::<i64>().map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_supported_pub_date_formats() {
        let expected = "2024-03-09T18:05:00+00:00";
        for raw in [
            "2024-03-09T18:05",
            "2024-03-09T18:05:00",
            "09.03.2024 18:05",
            "2024-03-09T21:05:00+03:00",
        ] {
            let parsed = parse_pub_date(raw).unwrap_or_else(|| panic!("{raw} should parse"));
            assert_eq!(parsed.to_rfc3339(), expected, "{raw}");
        }
        assert!(parse_pub_date("").is_none());
        assert!(parse_pub_date("next week").is_none());
    }

    #[test]
    fn formatted_pub_date_parses_back() {
        let value = parse_pub_date("2024-03-09T18:05").unwrap();
        assert_eq!(format_pub_date(value), "2024-03-09T18:05");
    }

    #[test]
    fn slug_rules() {
        assert!(is_valid_slug("travel"));
        assert!(is_valid_slug("my_trips-2024"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("путешествия"));
        assert!(!is_valid_slug("a b"));
        assert!(!is_valid_slug("../etc"));
    }

    #[test]
    fn next_must_stay_on_site() {
        assert_eq!(safe_next(Some("/posts/3/")), "/posts/3/");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(Some("/\\evil.example")), "/");
        assert_eq!(safe_next(Some("/a\r\nSet-Cookie: x=1")), "/");
        assert_eq!(safe_next(None), "/");
    }

    #[test]
    fn checkbox_and_select_values() {
        assert!(parse_checkbox("on"));
        assert!(parse_checkbox("True"));
        assert!(!parse_checkbox("off"));
        assert!(!parse_checkbox(""));

        assert_eq!(parse_optional_id(""), Ok(None));
        assert_eq!(parse_optional_id(" 5 "), Ok(Some(5)));
        assert!(parse_optional_id("five").is_err());
    }

    #[test]
    fn username_rules() {
        assert!(validate_username(&"leo.tolstoy+1".to_string()).is_ok());
        assert!(validate_username(&"leo tolstoy".to_string()).is_err());
        assert!(validate_username(&"leo/".to_string()).is_err());
        assert!(validate_username(&"лев".to_string()).is_err());
    }

    #[test]
    fn usernames_shadowed_by_profile_routes_are_reserved() {
        let err = validate_username(&"edit".to_string()).unwrap_err();
        assert_eq!(err.code, "reserved_username");
        assert!(validate_username(&"..".to_string()).is_err());
        assert!(validate_username(&"editor".to_string()).is_ok());
    }
}
