use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    #[default]
    Normal,
}

impl Priority {
    pub fn toggled(self) -> Self {
        match self {
            Priority::High => Priority::Normal,
            Priority::Normal => Priority::High,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "High"),
            Priority::Normal => write!(f, "Normal"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Completed,
    #[default]
    Ongoing,
}

impl Status {
    pub fn toggled(self) -> Self {
        match self {
            Status::Completed => Status::Ongoing,
            Status::Ongoing => Status::Completed,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Completed => write!(f, "Completed"),
            Status::Ongoing => write!(f, "Ongoing"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
}

impl Category {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Category {
            id,
            name: name.into(),
        }
    }

    /// Reference sent on submit. Only the id is authoritative server side.
    pub fn reference(id: u64) -> Self {
        Category {
            id,
            name: String::new(),
        }
    }
}

// Task struct
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: u64,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub due_date: String,
    pub priority: Priority,
    pub status: Status,
    pub category: Category,
}

/// A saved weather location. Shares the task record shape; `description`
/// holds the lookup key, `priority` the user's label and `status` the owner.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weather {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: Category,
}

impl Weather {
    pub fn owner(&self) -> &str {
        &self.status
    }

    pub fn label(&self) -> &str {
        &self.priority
    }

    /// Lookup key with the single trailing `=` some records carry removed.
    pub fn lookup_key(&self) -> &str {
        self.description
            .strip_suffix('=')
            .unwrap_or(&self.description)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Anything the list views group by category.
pub trait Categorized {
    fn id(&self) -> u64;
    fn category(&self) -> &Category;

    /// Without a server-assigned id the record only lives inside an open form.
    fn is_draft(&self) -> bool {
        self.id() == 0
    }
}

impl Categorized for Task {
    fn id(&self) -> u64 {
        self.id
    }

    fn category(&self) -> &Category {
        &self.category
    }
}

impl Categorized for Weather {
    fn id(&self) -> u64 {
        self.id
    }

    fn category(&self) -> &Category {
        &self.category
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct MainReadings {
    pub temp: f64,
    #[serde(default)]
    pub feels_like: f64,
    #[serde(default)]
    pub humidity: f64,
    #[serde(default)]
    pub pressure: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Wind {
    #[serde(default)]
    pub speed: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Condition {
    pub description: String,
}

/// Current conditions for a location as returned by the lookup endpoint.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct LocationData {
    pub name: String,
    pub main: MainReadings,
    #[serde(default)]
    pub wind: Wind,
    #[serde(default)]
    pub weather: Vec<Condition>,
    #[serde(default)]
    pub visibility: Option<f64>,
}

impl LocationData {
    pub fn condition(&self) -> &str {
        self.weather
            .first()
            .map(|c| c.description.as_str())
            .unwrap_or("")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchedAt {
    Millis(i64),
    Text(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub username: String,
    pub city_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub searched_at: Option<SearchedAt>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWeather<'a> {
    pub weather: &'a str,
    pub custom_location_name: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_deserializes_camel_case_fields() {
        let json = r#"{
            "id": 7,
            "title": "Write report",
            "description": "quarterly",
            "dueDate": "2024-05-01T00:00:00.000+00:00",
            "priority": "High",
            "status": "Ongoing",
            "category": {"id": 2, "name": "Work"}
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.id, 7);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.status, Status::Ongoing);
        assert_eq!(task.category, Category::new(2, "Work"));
        assert_eq!(task.due_date, "2024-05-01T00:00:00.000+00:00");
    }

    #[test]
    fn test_task_without_id_is_a_draft() {
        let json = r#"{"title":"t","description":"d","priority":"Normal",
            "status":"Completed","category":{"id":1,"name":"x"}}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert!(task.is_draft());
    }

    #[test]
    fn test_weather_accepts_null_category_and_due_date() {
        let json = r#"{"id":3,"title":"","description":"Oslo=","dueDate":null,
            "priority":"Home","status":"me@example.com","category":null}"#;
        let weather: Weather = serde_json::from_str(json).unwrap();
        assert_eq!(weather.category, Category::default());
        assert_eq!(weather.lookup_key(), "Oslo");
        assert_eq!(weather.owner(), "me@example.com");
        assert_eq!(weather.label(), "Home");
    }

    #[test]
    fn test_lookup_key_strips_only_one_equals() {
        let weather = Weather {
            description: "Paris==".to_string(),
            ..Weather::default()
        };
        assert_eq!(weather.lookup_key(), "Paris=");
    }

    #[test]
    fn test_location_data_condition() {
        let json = r#"{"name":"Oslo","main":{"temp":4.5,"feels_like":1.0,
            "humidity":80,"pressure":1012},"wind":{"speed":3.1},
            "weather":[{"description":"light rain"}],"visibility":10000}"#;
        let data: LocationData = serde_json::from_str(json).unwrap();
        assert_eq!(data.condition(), "light rain");
        assert_eq!(data.visibility, Some(10000.0));
    }

    #[test]
    fn test_history_item_accepts_numeric_or_text_timestamp() {
        let a: HistoryItem =
            serde_json::from_str(r#"{"username":"u","cityName":"Oslo","searchedAt":1700000000000}"#)
                .unwrap();
        let b: HistoryItem = serde_json::from_str(
            r#"{"id":1,"username":"u","cityName":"Rome","searchedAt":"2024-01-01T10:00:00"}"#,
        )
        .unwrap();
        assert_eq!(a.searched_at, Some(SearchedAt::Millis(1_700_000_000_000)));
        assert!(matches!(b.searched_at, Some(SearchedAt::Text(_))));
    }
}
