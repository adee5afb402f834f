//! Normalization of DSL enum values into AWS wire values

/// Last dotted segment of a DSL enum value with underscores turned into
/// hyphens
fn enum_tail(s: &str) -> String {
    s.rsplit('.').next().unwrap_or(s).replace('_', "-")
}

/// Normalize region value (e.g., "aws.Region.us_east_1" -> "us-east-1")
pub fn normalize_region(s: &str) -> String {
    enum_tail(s)
}

/// Normalize availability zone value (e.g., "aws.AvailabilityZone.us_east_1a" -> "us-east-1a")
pub fn normalize_availability_zone(s: &str) -> String {
    enum_tail(s)
}
