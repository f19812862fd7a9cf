use crate::api::{SearchHistoryApi, WeatherApi};
use crate::cancel::{CancelToken, Lifetime};
use crate::error::ApiError;
use crate::form::{Notice, MSG_MISSING_EMAIL};
use crate::models::{Categorized, HistoryItem, LocationData, SearchedAt, Weather};
use crate::page::LoadStatus;
use futures::future::join_all;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, error, warn};

pub const MSG_NEED_CITY: &str = "Please provide a city name.";
pub const MSG_LOOKUP_FAILED: &str = "Failed to fetch weather data. Please try again.";
pub const MSG_LOOKUP_FIRST: &str = "Look up a city before saving.";
pub const MSG_SAVED: &str = "Location saved successfully!";
pub const MSG_SAVE_FAILED: &str = "Failed to save location. Please try again.";

pub fn msg_no_data(city: &str) -> String {
    format!("Failed to fetch weather data for {}", city)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Temperature,
    Condition,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn toggled(self) -> Self {
        match self {
            Units::Metric => Units::Imperial,
            Units::Imperial => Units::Metric,
        }
    }

    pub fn convert(self, celsius: f64) -> f64 {
        match self {
            Units::Metric => celsius,
            Units::Imperial => celsius * 9.0 / 5.0 + 32.0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Units::Metric => "C",
            Units::Imperial => "F",
        }
    }
}

/// A saved location joined with its current conditions.
#[derive(Clone, Debug, PartialEq)]
pub struct WeatherCard {
    pub record: Weather,
    pub data: LocationData,
    pub units: Units,
}

impl WeatherCard {
    pub fn id(&self) -> u64 {
        self.record.id
    }

    pub fn label(&self) -> &str {
        self.record.label()
    }

    pub fn temperature(&self) -> f64 {
        self.units.convert(self.data.main.temp)
    }
}

/// Looks every saved location up concurrently. Failed lookups are logged
/// and left out.
pub async fn hydrate<A>(api: &A, records: Vec<Weather>) -> Vec<WeatherCard>
where
    A: WeatherApi + ?Sized,
{
    let lookups = records.into_iter().map(|record| async move {
        let result = api.lookup_location(record.lookup_key()).await;
        match result {
            Ok(data) => Some(WeatherCard {
                record,
                data,
                units: Units::Metric,
            }),
            Err(err) => {
                warn!(id = record.id, key = record.lookup_key(), error = %err, "error fetching weather data");
                None
            }
        }
    });
    join_all(lookups).await.into_iter().flatten().collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct WeatherList {
    cards: Vec<WeatherCard>,
    sort_key: SortKey,
    ascending: bool,
}

impl Default for WeatherList {
    fn default() -> Self {
        WeatherList {
            cards: Vec::new(),
            sort_key: SortKey::Name,
            ascending: true,
        }
    }
}

impl WeatherList {
    pub fn cards(&self) -> &[WeatherCard] {
        &self.cards
    }

    pub fn sort_key(&self) -> SortKey {
        self.sort_key
    }

    pub fn is_ascending(&self) -> bool {
        self.ascending
    }

    /// Replaces the held cards wholesale, keeping the current ordering.
    pub fn replace(&mut self, cards: Vec<WeatherCard>) {
        self.cards = cards;
        self.apply_sort();
    }

    pub fn sort_by(&mut self, key: SortKey) {
        self.sort_key = key;
        self.apply_sort();
    }

    pub fn toggle_order(&mut self) {
        self.ascending = !self.ascending;
        self.apply_sort();
    }

    pub fn toggle_units(&mut self, index: usize) {
        if let Some(card) = self.cards.get_mut(index) {
            card.units = card.units.toggled();
        }
    }

    fn apply_sort(&mut self) {
        let key = self.sort_key;
        let ascending = self.ascending;
        self.cards.sort_by(|a, b| {
            let ordering = compare(key, a, b);
            if ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });
    }
}

fn compare(key: SortKey, a: &WeatherCard, b: &WeatherCard) -> Ordering {
    match key {
        SortKey::Name => a.data.name.to_lowercase().cmp(&b.data.name.to_lowercase()),
        SortKey::Temperature => a.data.main.temp.total_cmp(&b.data.main.temp),
        SortKey::Condition => a
            .data
            .condition()
            .to_lowercase()
            .cmp(&b.data.condition().to_lowercase()),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeatherField {
    City,
    CustomName,
}

#[derive(Clone, Debug, PartialEq)]
pub enum WeatherFormRequest {
    Lookup {
        city: String,
        email: String,
    },
    Save {
        city: String,
        email: String,
        custom_name: String,
    },
}

#[derive(Debug)]
pub enum WeatherFormOutcome {
    Looked {
        city: String,
        result: Result<LocationData, ApiError>,
    },
    Saved(Result<(), ApiError>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WeatherFormSignal {
    RefreshHistory,
    Saved { message: String },
}

pub async fn execute_form<A>(api: &A, request: WeatherFormRequest) -> WeatherFormOutcome
where
    A: WeatherApi + SearchHistoryApi + ?Sized,
{
    match request {
        WeatherFormRequest::Lookup { city, email } => {
            let result = api.lookup_location(&city).await;
            if result.is_ok() {
                let item = HistoryItem {
                    id: None,
                    username: email.clone(),
                    city_name: city.clone(),
                    searched_at: Some(SearchedAt::Millis(chrono::Utc::now().timestamp_millis())),
                };
                if let Err(err) = api.append_search_history(&email, &item).await {
                    warn!(error = %err, "failed to record search history");
                }
            }
            WeatherFormOutcome::Looked { city, result }
        }
        WeatherFormRequest::Save {
            city,
            email,
            custom_name,
        } => WeatherFormOutcome::Saved(api.create_weather(&city, &email, &custom_name).await),
    }
}

/// City lookup popup: search, preview conditions, save under a custom name.
#[derive(Debug)]
pub struct WeatherForm {
    identity: String,
    pub city: String,
    pub custom_name: String,
    pub data: Option<LocationData>,
    pub is_looking_up: bool,
    pub is_saving: bool,
    pub notice: Notice,
    pub focus: WeatherField,
    history_cursor: Option<usize>,
    lifetime: Lifetime,
}

impl WeatherForm {
    pub fn new(identity: &str) -> Self {
        WeatherForm {
            identity: identity.to_string(),
            city: String::new(),
            custom_name: String::new(),
            data: None,
            is_looking_up: false,
            is_saving: false,
            notice: Notice::default(),
            focus: WeatherField::City,
            history_cursor: None,
            lifetime: Lifetime::new(),
        }
    }

    pub fn token(&self) -> CancelToken {
        self.lifetime.token()
    }

    pub fn lookup(&mut self) -> Option<WeatherFormRequest> {
        if self.is_looking_up {
            return None;
        }
        if self.city.trim().is_empty() {
            self.notice.show(MSG_NEED_CITY);
            return None;
        }
        self.is_looking_up = true;
        Some(WeatherFormRequest::Lookup {
            city: self.city.clone(),
            email: self.identity.clone(),
        })
    }

    pub fn save(&mut self) -> Option<WeatherFormRequest> {
        if self.is_saving {
            return None;
        }
        let Some(data) = &self.data else {
            self.notice.show(MSG_LOOKUP_FIRST);
            return None;
        };
        if self.identity.is_empty() {
            self.notice.show(MSG_MISSING_EMAIL);
            return None;
        }
        self.is_saving = true;
        Some(WeatherFormRequest::Save {
            city: data.name.clone(),
            email: self.identity.clone(),
            custom_name: self.custom_name.clone(),
        })
    }

    pub fn apply(&mut self, outcome: WeatherFormOutcome) -> Option<WeatherFormSignal> {
        match outcome {
            WeatherFormOutcome::Looked { city, result } => {
                self.is_looking_up = false;
                match result {
                    Ok(data) => self.data = Some(data),
                    Err(ApiError::Rejected(reason)) => {
                        warn!(%city, %reason, "lookup returned no data");
                        self.data = None;
                        self.notice.show(msg_no_data(&city));
                    }
                    Err(err) => {
                        error!(%city, error = %err, "failed to fetch weather data");
                        self.data = None;
                        self.notice.show(MSG_LOOKUP_FAILED);
                    }
                }
                Some(WeatherFormSignal::RefreshHistory)
            }
            WeatherFormOutcome::Saved(result) => {
                self.is_saving = false;
                match result {
                    Ok(()) => Some(WeatherFormSignal::Saved {
                        message: MSG_SAVED.to_string(),
                    }),
                    Err(err) => {
                        error!(error = %err, "failed to save weather data");
                        self.notice.show(MSG_SAVE_FAILED);
                        None
                    }
                }
            }
        }
    }

    /// Steps through past searches, filling the city field.
    pub fn browse_history(&mut self, history: &[HistoryItem], forward: bool) {
        if history.is_empty() {
            return;
        }
        let len = history.len();
        let next = match self.history_cursor {
            Some(i) if forward => (i + 1) % len,
            Some(i) => (i + len - 1) % len,
            None if forward => 0,
            None => len - 1,
        };
        self.history_cursor = Some(next);
        self.city = history[next].city_name.clone();
    }

    pub fn toggle_field(&mut self) {
        self.focus = match self.focus {
            WeatherField::City => WeatherField::CustomName,
            WeatherField::CustomName => WeatherField::City,
        };
    }

    pub fn input_char(&mut self, c: char) {
        match self.focus {
            WeatherField::City => {
                self.history_cursor = None;
                self.city.push(c);
            }
            WeatherField::CustomName => self.custom_name.push(c),
        }
    }

    pub fn backspace(&mut self) {
        match self.focus {
            WeatherField::City => {
                self.history_cursor = None;
                self.city.pop();
            }
            WeatherField::CustomName => {
                self.custom_name.pop();
            }
        }
    }
}

/// Pending rename of a card's label.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelEdit {
    pub record: Weather,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum WeatherPageRequest {
    Fetch { email: String },
    LoadHistory { email: String },
    Delete { id: u64 },
    UpdateLabel { id: u64, record: Weather },
}

#[derive(Debug)]
pub enum WeatherPageOutcome {
    Fetched(Result<Vec<WeatherCard>, ApiError>),
    HistoryLoaded(Result<Vec<HistoryItem>, ApiError>),
    Deleted { id: u64, result: Result<(), ApiError> },
    LabelUpdated(Result<(), ApiError>),
}

pub async fn execute_page<A>(api: &A, request: WeatherPageRequest) -> WeatherPageOutcome
where
    A: WeatherApi + SearchHistoryApi + ?Sized,
{
    match request {
        WeatherPageRequest::Fetch { email } => {
            let result = match api.list_weather_for_user(&email).await {
                Ok(records) => Ok(hydrate(api, records).await),
                Err(err) => Err(err),
            };
            WeatherPageOutcome::Fetched(result)
        }
        WeatherPageRequest::LoadHistory { email } => {
            WeatherPageOutcome::HistoryLoaded(api.get_search_history(&email).await)
        }
        WeatherPageRequest::Delete { id } => WeatherPageOutcome::Deleted {
            id,
            result: api.delete_weather(id).await,
        },
        WeatherPageRequest::UpdateLabel { id, record } => {
            WeatherPageOutcome::LabelUpdated(api.update_weather(id, &record).await)
        }
    }
}

#[derive(Debug)]
pub struct WeatherPage {
    email: String,
    pub status: LoadStatus,
    pub list: WeatherList,
    pub history: Vec<HistoryItem>,
    pub form: Option<WeatherForm>,
    pub label_edit: Option<LabelEdit>,
    pub selected: usize,
    deleting: HashSet<u64>,
    pub notice: Notice,
    lifetime: Lifetime,
}

impl WeatherPage {
    pub fn mount(email: &str) -> (Self, Vec<WeatherPageRequest>) {
        let mut page = WeatherPage {
            email: email.to_string(),
            status: LoadStatus::Idle,
            list: WeatherList::default(),
            history: Vec::new(),
            form: None,
            label_edit: None,
            selected: 0,
            deleting: HashSet::new(),
            notice: Notice::default(),
            lifetime: Lifetime::new(),
        };
        let mut requests: Vec<WeatherPageRequest> = page.refetch().into_iter().collect();
        requests.extend(page.load_history());
        (page, requests)
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn token(&self) -> CancelToken {
        self.lifetime.token()
    }

    pub fn refetch(&mut self) -> Option<WeatherPageRequest> {
        if self.email.is_empty() {
            debug!("no identity, skipping weather fetch");
            return None;
        }
        if self.status != LoadStatus::Ready {
            self.status = LoadStatus::Loading;
        }
        Some(WeatherPageRequest::Fetch {
            email: self.email.clone(),
        })
    }

    pub fn load_history(&self) -> Option<WeatherPageRequest> {
        if self.email.is_empty() {
            return None;
        }
        Some(WeatherPageRequest::LoadHistory {
            email: self.email.clone(),
        })
    }

    pub fn is_deleting(&self, id: u64) -> bool {
        self.deleting.contains(&id)
    }

    pub fn selected_card(&self) -> Option<&WeatherCard> {
        self.list.cards().get(self.selected)
    }

    pub fn next(&mut self) {
        let len = self.list.cards().len();
        if len > 0 {
            self.selected = (self.selected + 1) % len;
        }
    }

    pub fn previous(&mut self) {
        let len = self.list.cards().len();
        if len > 0 {
            self.selected = (self.selected + len - 1) % len;
        }
    }

    pub fn toggle_create(&mut self) {
        if self.form.take().is_none() {
            self.notice.dismiss();
            self.form = Some(WeatherForm::new(&self.email));
        }
    }

    pub fn delete_selected(&mut self) -> Option<WeatherPageRequest> {
        let id = self.selected_card()?.id();
        if !self.deleting.insert(id) {
            return None;
        }
        Some(WeatherPageRequest::Delete { id })
    }

    pub fn begin_label_edit(&mut self) {
        if let Some(card) = self.selected_card() {
            self.label_edit = Some(LabelEdit {
                record: card.record.clone(),
                text: card.label().to_string(),
            });
        }
    }

    pub fn save_label_edit(&mut self) -> Option<WeatherPageRequest> {
        let edit = self.label_edit.take()?;
        let record = Weather {
            title: String::new(),
            priority: edit.text,
            ..edit.record
        };
        Some(WeatherPageRequest::UpdateLabel {
            id: record.id,
            record,
        })
    }

    pub fn apply(&mut self, outcome: WeatherPageOutcome) -> Option<WeatherPageRequest> {
        match outcome {
            WeatherPageOutcome::Fetched(Ok(cards)) => {
                debug!(count = cards.len(), "weather cards hydrated");
                self.list.replace(cards.into_iter().filter(|c| !c.record.is_draft()).collect());
                self.status = LoadStatus::Ready;
                let len = self.list.cards().len();
                if self.selected >= len {
                    self.selected = len.saturating_sub(1);
                }
                None
            }
            WeatherPageOutcome::Fetched(Err(err)) => {
                error!(error = %err, "error loading saved locations");
                self.status = LoadStatus::Failed;
                None
            }
            WeatherPageOutcome::HistoryLoaded(Ok(history)) => {
                self.history = history;
                None
            }
            WeatherPageOutcome::HistoryLoaded(Err(err)) => {
                warn!(error = %err, "error loading search history");
                None
            }
            WeatherPageOutcome::Deleted { id, result } => {
                self.deleting.remove(&id);
                match result {
                    Ok(()) => self.refetch(),
                    Err(err) => {
                        error!(id, error = %err, "error deleting weather data");
                        None
                    }
                }
            }
            WeatherPageOutcome::LabelUpdated(Ok(())) => self.refetch(),
            WeatherPageOutcome::LabelUpdated(Err(err)) => {
                error!(error = %err, "error updating weather data");
                None
            }
        }
    }

    /// Returns the page requests a form signal calls for.
    pub fn on_form_signal(&mut self, signal: WeatherFormSignal) -> Option<WeatherPageRequest> {
        match signal {
            WeatherFormSignal::RefreshHistory => self.load_history(),
            WeatherFormSignal::Saved { message } => {
                self.form = None;
                self.notice.show(message);
                self.refetch()
            }
        }
    }
}
