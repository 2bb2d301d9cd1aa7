/// Canonical amenity names. Classifier output is only ever matched against
/// these, verbatim, and the store's multi-select values come from here.
pub const AMENITIES: [&str; 25] = [
    "Air Conditioning",
    "Heating System",
    "Laundry Facilities",
    "Dishwasher",
    "Refrigerator",
    "Stove/Oven",
    "Microwave",
    "Garbage Disposal",
    "Internet Access",
    "Cable-Ready Outlets",
    "Balcony/Patio",
    "Storage Space",
    "Covered Parking",
    "Garage",
    "Pool",
    "Fitness Center",
    "Clubhouse",
    "Playground",
    "Pet-Friendly Options",
    "Security System",
    "On-site Management",
    "Elevator",
    "Public Transportation Access",
    "Smoke-Free Environment",
    "Wheelchair Access",
];

/// Comma-joined vocabulary, as embedded in the classification prompt.
pub fn vocabulary_list() -> String {
    AMENITIES.join(", ")
}
