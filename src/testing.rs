//! In-memory stand-in for the REST backend, recording every call.

use crate::api::{CategoryApi, SearchHistoryApi, TaskApi, WeatherApi};
use crate::error::ApiError;
use crate::models::{Category, HistoryItem, LocationData, MainReadings, Task, Weather, Condition};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct FakeBackend {
    tasks: Mutex<Vec<(String, Task)>>,
    categories: Mutex<Vec<Category>>,
    suggestion: Mutex<Option<String>>,
    weather: Mutex<Vec<Weather>>,
    locations: Mutex<HashMap<String, LocationData>>,
    history: Mutex<Vec<HistoryItem>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    next_id: AtomicU64,
}

pub fn location(name: &str, temp: f64, condition: &str) -> LocationData {
    LocationData {
        name: name.to_string(),
        main: MainReadings {
            temp,
            ..MainReadings::default()
        },
        weather: vec![Condition {
            description: condition.to_string(),
        }],
        ..LocationData::default()
    }
}

impl FakeBackend {
    pub fn fail(&self, op: &str) {
        self.failing.lock().unwrap().insert(op.to_string());
    }

    pub fn recover(&self, op: &str) {
        self.failing.lock().unwrap().remove(op);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == op).count()
    }

    pub fn set_suggestion(&self, suggestion: &str) {
        *self.suggestion.lock().unwrap() = Some(suggestion.to_string());
    }

    pub fn seed_tasks(&self, email: &str, tasks: Vec<Task>) {
        let mut store = self.tasks.lock().unwrap();
        for task in tasks {
            self.bump_past(task.id);
            store.push((email.to_string(), task));
        }
    }

    pub fn tasks_for(&self, email: &str) -> Vec<Task> {
        self.tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|(owner, _)| owner == email)
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub fn seed_categories(&self, categories: Vec<Category>) {
        for c in &categories {
            self.bump_past(c.id);
        }
        self.categories.lock().unwrap().extend(categories);
    }

    pub fn seed_weather(&self, weather: Vec<Weather>) {
        for w in &weather {
            self.bump_past(w.id);
        }
        self.weather.lock().unwrap().extend(weather);
    }

    pub fn weather_records(&self) -> Vec<Weather> {
        self.weather.lock().unwrap().clone()
    }

    pub fn add_location(&self, key: &str, data: LocationData) {
        self.locations.lock().unwrap().insert(key.to_string(), data);
    }

    pub fn history(&self) -> Vec<HistoryItem> {
        self.history.lock().unwrap().clone()
    }

    fn bump_past(&self, id: u64) {
        self.next_id.fetch_max(id, Ordering::SeqCst);
    }

    fn new_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn record(&self, op: &str) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(op.to_string());
        if self.failing.lock().unwrap().contains(op) {
            Err(ApiError::Malformed(format!("{} failed", op)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TaskApi for FakeBackend {
    async fn list_tasks_for_user(&self, email: &str) -> Result<Vec<Task>, ApiError> {
        self.record("list_tasks_for_user")?;
        Ok(self.tasks_for(email))
    }

    async fn create_task(&self, task: &Task, email: &str) -> Result<Task, ApiError> {
        self.record("create_task")?;
        let mut created = task.clone();
        created.id = self.new_id();
        if let Some(c) = self
            .categories
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == created.category.id)
        {
            created.category = c.clone();
        }
        self.tasks
            .lock()
            .unwrap()
            .push((email.to_string(), created.clone()));
        Ok(created)
    }

    async fn update_task(&self, id: u64, task: &Task) -> Result<Task, ApiError> {
        self.record("update_task")?;
        let mut store = self.tasks.lock().unwrap();
        let slot = store
            .iter_mut()
            .find(|(_, t)| t.id == id)
            .ok_or_else(|| ApiError::Malformed(format!("no task {}", id)))?;
        slot.1 = Task { id, ..task.clone() };
        Ok(slot.1.clone())
    }

    async fn delete_task(&self, id: u64) -> Result<(), ApiError> {
        self.record("delete_task")?;
        self.tasks.lock().unwrap().retain(|(_, t)| t.id != id);
        Ok(())
    }
}

#[async_trait]
impl CategoryApi for FakeBackend {
    async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        self.record("list_categories")?;
        Ok(self.categories.lock().unwrap().clone())
    }

    async fn suggest_category(&self, _text: &str) -> Result<String, ApiError> {
        self.record("suggest_category")?;
        self.suggestion
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ApiError::Malformed("no suggestion".to_string()))
    }

    async fn create_category(&self, name: &str) -> Result<Category, ApiError> {
        self.record("create_category")?;
        let category = Category::new(self.new_id(), name);
        self.categories.lock().unwrap().push(category.clone());
        Ok(category)
    }
}

#[async_trait]
impl WeatherApi for FakeBackend {
    async fn list_weather_for_user(&self, email: &str) -> Result<Vec<Weather>, ApiError> {
        self.record("list_weather_for_user")?;
        Ok(self
            .weather
            .lock()
            .unwrap()
            .iter()
            .filter(|w| w.owner() == email)
            .cloned()
            .collect())
    }

    async fn create_weather(
        &self,
        city: &str,
        email: &str,
        custom_name: &str,
    ) -> Result<(), ApiError> {
        self.record("create_weather")?;
        let record = Weather {
            id: self.new_id(),
            description: city.to_string(),
            priority: custom_name.to_string(),
            status: email.to_string(),
            ..Weather::default()
        };
        self.weather.lock().unwrap().push(record);
        Ok(())
    }

    async fn update_weather(&self, id: u64, weather: &Weather) -> Result<(), ApiError> {
        self.record("update_weather")?;
        let mut store = self.weather.lock().unwrap();
        if let Some(slot) = store.iter_mut().find(|w| w.id == id) {
            *slot = Weather { id, ..weather.clone() };
        }
        Ok(())
    }

    async fn delete_weather(&self, id: u64) -> Result<(), ApiError> {
        self.record("delete_weather")?;
        self.weather.lock().unwrap().retain(|w| w.id != id);
        Ok(())
    }

    async fn lookup_location(&self, query: &str) -> Result<LocationData, ApiError> {
        self.record("lookup_location")?;
        self.locations
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .ok_or_else(|| ApiError::Rejected(format!("city not found: {}", query)))
    }
}

#[async_trait]
impl SearchHistoryApi for FakeBackend {
    async fn get_search_history(&self, user: &str) -> Result<Vec<HistoryItem>, ApiError> {
        self.record("get_search_history")?;
        Ok(self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.username == user)
            .cloned()
            .collect())
    }

    async fn append_search_history(
        &self,
        _user: &str,
        item: &HistoryItem,
    ) -> Result<(), ApiError> {
        self.record("append_search_history")?;
        self.history.lock().unwrap().push(item.clone());
        Ok(())
    }
}
