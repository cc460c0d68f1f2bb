//! Question definitions per category

use super::Question;
use super::QuestionType::{Date, Multiselect, Number, Select, Text, Textarea};

pub(super) static DEMOGRAPHICS: &[Question] = &[
    Question::new("age", Number, "Age", true),
    Question::choice(
        "gender",
        Select,
        "Gender",
        true,
        &["Male", "Female", "Non-binary", "Prefer not to say"],
    ),
    Question::new("dateOfBirth", Date, "Date of birth", true),
    Question::new("country", Text, "Country", true),
    Question::new("state", Text, "State / Province", true),
    Question::new("city", Text, "City", true),
    Question::new("zipCode", Text, "Postal code", false),
    Question::choice(
        "ethnicity",
        Select,
        "Ethnicity",
        false,
        &[
            "Asian",
            "Black or African American",
            "Hispanic or Latino",
            "Middle Eastern or North African",
            "Native American or Alaska Native",
            "Native Hawaiian or Pacific Islander",
            "White",
            "Multiracial",
            "Prefer not to say",
        ],
    ),
    Question::choice(
        "maritalStatus",
        Select,
        "Marital status",
        false,
        &["Single", "Married", "Domestic partnership", "Divorced", "Widowed"],
    ),
    Question::new("householdSize", Number, "People in household", false),
    Question::choice(
        "householdIncome",
        Select,
        "Annual household income",
        false,
        &[
            "Under $25,000",
            "$25,000 - $49,999",
            "$50,000 - $74,999",
            "$75,000 - $99,999",
            "$100,000 - $149,999",
            "$150,000 or more",
        ],
    ),
    Question::choice(
        "employmentStatus",
        Select,
        "Employment status",
        false,
        &[
            "Employed full-time",
            "Employed part-time",
            "Self-employed",
            "Unemployed",
            "Student",
            "Retired",
        ],
    ),
];

pub(super) static BELIEFS: &[Question] = &[
    Question::choice(
        "politicalAffiliation",
        Select,
        "Political leaning",
        false,
        &["Liberal", "Moderate", "Conservative", "Other", "Prefer not to say"],
    ),
    Question::choice(
        "religion",
        Select,
        "Religious affiliation",
        false,
        &[
            "Christian",
            "Muslim",
            "Jewish",
            "Hindu",
            "Buddhist",
            "None",
            "Other",
            "Prefer not to say",
        ],
    ),
    Question::choice(
        "causes",
        Multiselect,
        "Causes you care about",
        true,
        &[
            "Environment",
            "Education",
            "Healthcare",
            "Animal welfare",
            "Human rights",
            "Economic growth",
        ],
    ),
    Question::scale("environmentalConcern", "Concern for the environment", false, 1, 10),
];

pub(super) static LIFESTYLE: &[Question] = &[
    Question::choice(
        "hobbies",
        Multiselect,
        "Hobbies",
        true,
        &[
            "Reading",
            "Gaming",
            "Cooking",
            "Travel",
            "Sports",
            "Music",
            "Art",
            "Gardening",
        ],
    ),
    Question::choice(
        "exerciseFrequency",
        Select,
        "How often do you exercise?",
        false,
        &["Never", "Monthly", "Weekly", "Several times a week", "Daily"],
    ),
    Question::choice(
        "dietaryPreference",
        Select,
        "Dietary preference",
        false,
        &["No restrictions", "Vegetarian", "Vegan", "Pescatarian", "Keto", "Other"],
    ),
    Question::choice(
        "pets",
        Multiselect,
        "Pets in your household",
        false,
        &["Dog", "Cat", "Fish", "Bird", "Other", "None"],
    ),
];

pub(super) static CAREER: &[Question] = &[
    Question::choice(
        "education",
        Select,
        "Highest education completed",
        true,
        &[
            "High school",
            "Some college",
            "Associate degree",
            "Bachelor's degree",
            "Master's degree",
            "Doctorate",
        ],
    ),
    Question::new("occupation", Text, "Occupation", false),
    Question::new("industry", Text, "Industry", false),
    Question::new("yearsExperience", Number, "Years of work experience", false),
    Question::new("careerGoals", Textarea, "Career goals", false),
];

pub(super) static MEDIA: &[Question] = &[
    Question::choice(
        "newsSources",
        Multiselect,
        "Where do you get news?",
        true,
        &["Television", "Newspapers", "Radio", "Social media", "Podcasts", "News websites"],
    ),
    Question::choice(
        "socialPlatforms",
        Multiselect,
        "Social platforms you use",
        false,
        &["Facebook", "Instagram", "TikTok", "X", "LinkedIn", "YouTube", "Reddit"],
    ),
    Question::new("dailyScreenHours", Number, "Hours of screen time per day", false),
    Question::choice(
        "streamingServices",
        Multiselect,
        "Streaming subscriptions",
        false,
        &["Netflix", "Disney+", "Prime Video", "Hulu", "Max", "Apple TV+", "None"],
    ),
];

pub(super) static TECHNOLOGY: &[Question] = &[
    Question::choice(
        "devices",
        Multiselect,
        "Devices you own",
        true,
        &["Smartphone", "Laptop", "Desktop", "Tablet", "Smartwatch", "Smart speaker"],
    ),
    Question::scale("techSavviness", "How comfortable are you with new technology?", false, 1, 10),
    Question::choice(
        "earlyAdopter",
        Select,
        "When do you usually adopt new products?",
        false,
        &["As soon as they launch", "After reviews", "When mainstream", "Only when necessary"],
    ),
];

pub(super) static BUYING: &[Question] = &[
    Question::choice(
        "shoppingPreference",
        Select,
        "Preferred way to shop",
        true,
        &["In store", "Online", "Both equally"],
    ),
    Question::scale("priceSensitivity", "How price sensitive are you?", false, 1, 10),
    Question::scale("brandLoyalty", "How loyal are you to brands?", false, 1, 10),
    Question::new("lastMajorPurchase", Date, "Date of your last major purchase", false),
];

pub(super) static PSYCHOGRAPHICS: &[Question] = &[
    Question::scale("riskTolerance", "Willingness to take risks", true, 1, 10),
    Question::choice(
        "personalityTraits",
        Multiselect,
        "Traits that describe you",
        false,
        &["Adventurous", "Analytical", "Creative", "Practical", "Social", "Reserved"],
    ),
    Question::new("lifeGoals", Textarea, "What matters most to you?", false),
];
