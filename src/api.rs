use crate::config::Config;
use crate::error::ApiError;
use crate::models::{Category, HistoryItem, LocationData, NewWeather, Task, Weather};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn list_tasks_for_user(&self, email: &str) -> Result<Vec<Task>, ApiError>;
    async fn create_task(&self, task: &Task, email: &str) -> Result<Task, ApiError>;
    async fn update_task(&self, id: u64, task: &Task) -> Result<Task, ApiError>;
    async fn delete_task(&self, id: u64) -> Result<(), ApiError>;
}

#[async_trait]
pub trait CategoryApi: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<Category>, ApiError>;
    async fn suggest_category(&self, text: &str) -> Result<String, ApiError>;
    async fn create_category(&self, name: &str) -> Result<Category, ApiError>;
}

#[async_trait]
pub trait WeatherApi: Send + Sync {
    async fn list_weather_for_user(&self, email: &str) -> Result<Vec<Weather>, ApiError>;
    async fn create_weather(
        &self,
        city: &str,
        email: &str,
        custom_name: &str,
    ) -> Result<(), ApiError>;
    async fn update_weather(&self, id: u64, weather: &Weather) -> Result<(), ApiError>;
    async fn delete_weather(&self, id: u64) -> Result<(), ApiError>;
    /// `Err(ApiError::Rejected)` when the backend answers with a reason
    /// string instead of location data.
    async fn lookup_location(&self, query: &str) -> Result<LocationData, ApiError>;
}

#[async_trait]
pub trait SearchHistoryApi: Send + Sync {
    async fn get_search_history(&self, user: &str) -> Result<Vec<HistoryItem>, ApiError>;
    async fn append_search_history(&self, user: &str, item: &HistoryItem)
        -> Result<(), ApiError>;
}

/// Everything the shell talks to.
pub trait Backend: TaskApi + CategoryApi + WeatherApi + SearchHistoryApi {}

impl<T> Backend for T where T: TaskApi + CategoryApi + WeatherApi + SearchHistoryApi {}

#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    task_url: String,
    category_url: String,
    weather_url: String,
    lookup_url: String,
    history_url: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> Self {
        ApiClient {
            client: Client::new(),
            task_url: config.task_api_url.clone(),
            category_url: config.category_api_url.clone(),
            weather_url: config.weather_api_url.clone(),
            lookup_url: config.lookup_api_url.clone(),
            history_url: config.history_api_url.clone(),
        }
    }
}

/// Appends percent-encoded path segments to a base url.
fn endpoint(base: &str, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = Url::parse(base).map_err(|e| ApiError::Endpoint(format!("{}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| ApiError::Endpoint(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn check(res: Response) -> Result<Response, ApiError> {
    if res.status().is_success() {
        Ok(res)
    } else {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        Err(ApiError::Status { status, body })
    }
}

// Elements that don't match the expected shape are skipped, not fatal.
fn decode_list<T: DeserializeOwned>(values: Vec<Value>, what: &str) -> Vec<T> {
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<T>(value) {
            Ok(item) => Some(item),
            Err(err) => {
                warn!(kind = what, error = %err, "skipping malformed list element");
                None
            }
        })
        .collect()
}

fn decode_suggestion(body: &str) -> Result<String, ApiError> {
    let suggestion = serde_json::from_str::<String>(body).unwrap_or_else(|_| body.to_string());
    let suggestion = suggestion.trim().to_string();
    if suggestion.is_empty() {
        Err(ApiError::Malformed("empty category suggestion".to_string()))
    } else {
        Ok(suggestion)
    }
}

fn decode_lookup(body: &str) -> Result<LocationData, ApiError> {
    match serde_json::from_str::<Value>(body) {
        Ok(value @ Value::Object(_)) => {
            serde_json::from_value(value).map_err(|e| ApiError::Malformed(e.to_string()))
        }
        Ok(Value::String(reason)) => Err(ApiError::Rejected(reason)),
        Ok(other) => Err(ApiError::Rejected(other.to_string())),
        Err(_) => Err(ApiError::Rejected(body.trim().to_string())),
    }
}

#[async_trait]
impl TaskApi for ApiClient {
    #[tracing::instrument(skip(self))]
    async fn list_tasks_for_user(&self, email: &str) -> Result<Vec<Task>, ApiError> {
        let url = endpoint(&self.task_url, &["email", email])?;
        let res = check(self.client.get(url).send().await?).await?;
        let values = res.json::<Vec<Value>>().await?;
        debug!(count = values.len(), "fetched tasks");
        Ok(decode_list(values, "task"))
    }

    #[tracing::instrument(skip(self, task), fields(title = %task.title))]
    async fn create_task(&self, task: &Task, email: &str) -> Result<Task, ApiError> {
        let url = endpoint(&self.task_url, &[email])?;
        let res = check(self.client.post(url).json(task).send().await?).await?;
        Ok(res.json::<Task>().await?)
    }

    #[tracing::instrument(skip(self, task))]
    async fn update_task(&self, id: u64, task: &Task) -> Result<Task, ApiError> {
        let url = endpoint(&self.task_url, &[&id.to_string()])?;
        let res = check(self.client.put(url).json(task).send().await?).await?;
        Ok(res.json::<Task>().await?)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_task(&self, id: u64) -> Result<(), ApiError> {
        let url = endpoint(&self.task_url, &[&id.to_string()])?;
        check(self.client.delete(url).send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl CategoryApi for ApiClient {
    #[tracing::instrument(skip(self))]
    async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        let url = endpoint(&self.category_url, &[""])?;
        let res = check(self.client.get(url).send().await?).await?;
        let values = res.json::<Vec<Value>>().await?;
        Ok(decode_list(values, "category"))
    }

    #[tracing::instrument(skip(self, text))]
    async fn suggest_category(&self, text: &str) -> Result<String, ApiError> {
        let url = endpoint(&self.category_url, &["suggest", text])?;
        let res = check(self.client.get(url).send().await?).await?;
        decode_suggestion(&res.text().await?)
    }

    #[tracing::instrument(skip(self))]
    async fn create_category(&self, name: &str) -> Result<Category, ApiError> {
        let url = endpoint(&self.category_url, &["create"])?;
        let res = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(name.to_string())
            .send()
            .await?;
        Ok(check(res).await?.json::<Category>().await?)
    }
}

#[async_trait]
impl WeatherApi for ApiClient {
    #[tracing::instrument(skip(self))]
    async fn list_weather_for_user(&self, email: &str) -> Result<Vec<Weather>, ApiError> {
        let url = endpoint(&self.weather_url, &[])?;
        let res = check(self.client.get(url).send().await?).await?;
        let all: Vec<Weather> = decode_list(res.json::<Vec<Value>>().await?, "weather");
        Ok(all.into_iter().filter(|w| w.owner() == email).collect())
    }

    #[tracing::instrument(skip(self))]
    async fn create_weather(
        &self,
        city: &str,
        email: &str,
        custom_name: &str,
    ) -> Result<(), ApiError> {
        let url = endpoint(&self.weather_url, &[email])?;
        let body = NewWeather {
            weather: city,
            custom_location_name: custom_name,
        };
        check(self.client.post(url).json(&body).send().await?).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, weather))]
    async fn update_weather(&self, id: u64, weather: &Weather) -> Result<(), ApiError> {
        let url = endpoint(&self.weather_url, &[&id.to_string()])?;
        let body = json!({
            "id": id,
            "title": "",
            "description": weather.description,
            "dueDate": null,
            "priority": weather.priority,
            "status": weather.status,
            "user": null,
            "category": null
        });
        check(self.client.put(url).json(&body).send().await?).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_weather(&self, id: u64) -> Result<(), ApiError> {
        let url = endpoint(&self.weather_url, &[&id.to_string()])?;
        check(self.client.delete(url).send().await?).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn lookup_location(&self, query: &str) -> Result<LocationData, ApiError> {
        let url = endpoint(&self.lookup_url, &["find", query])?;
        let res = check(self.client.get(url).send().await?).await?;
        decode_lookup(&res.text().await?)
    }
}

#[async_trait]
impl SearchHistoryApi for ApiClient {
    #[tracing::instrument(skip(self))]
    async fn get_search_history(&self, user: &str) -> Result<Vec<HistoryItem>, ApiError> {
        let url = endpoint(&self.history_url, &["search-history", "user", user])?;
        let res = check(self.client.get(url).send().await?).await?;
        Ok(decode_list(res.json::<Vec<Value>>().await?, "search history"))
    }

    #[tracing::instrument(skip(self, item), fields(city = %item.city_name))]
    async fn append_search_history(
        &self,
        user: &str,
        item: &HistoryItem,
    ) -> Result<(), ApiError> {
        let url = endpoint(&self.history_url, &["search-history", user])?;
        check(self.client.post(url).json(item).send().await?).await?;
        Ok(())
    }
}
