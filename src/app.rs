use crate::api::Backend;
use crate::cache::QueryCache;
use crate::cancel::CancelToken;
use crate::config::Variant;
use crate::form::{self, FormOutcome, FormRequest};
use crate::page::{self, PageOutcome, PageRequest, TaskPage};
use crate::parser::{Location, Route};
use crate::weather::{
    execute_form, execute_page, SortKey, WeatherField, WeatherFormOutcome, WeatherFormRequest,
    WeatherPage, WeatherPageOutcome, WeatherPageRequest,
};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

pub type SharedBackend = Arc<dyn Backend>;

#[derive(Debug)]
pub enum AppEvent {
    TaskPage(PageOutcome),
    TaskForm(FormOutcome),
    WeatherPage(WeatherPageOutcome),
    WeatherForm(WeatherFormOutcome),
}

/// A finished remote operation together with the token of whoever asked.
#[derive(Debug)]
pub struct Completed {
    token: CancelToken,
    event: AppEvent,
}

#[derive(Debug, Default)]
pub struct Landing {
    pub email: String,
}

pub enum Screen {
    Landing(Landing),
    Tasks(TaskPage),
    Weather(WeatherPage),
}

/// Spawns remote operations and reports them back over the channel.
struct Executor {
    api: SharedBackend,
    tx: UnboundedSender<Completed>,
}

impl Executor {
    fn spawn<F>(&self, mut token: CancelToken, work: F)
    where
        F: Future<Output = AppEvent> + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let owner = token.clone();
            tokio::select! {
                _ = token.cancelled() => debug!("owner closed, request abandoned"),
                event = work => {
                    let _ = tx.send(Completed { token: owner, event });
                }
            }
        });
    }

    fn task_page(&self, token: CancelToken, request: PageRequest) {
        let api = Arc::clone(&self.api);
        self.spawn(token, async move {
            AppEvent::TaskPage(page::execute(&*api, request).await)
        });
    }

    fn task_form(&self, token: CancelToken, request: FormRequest) {
        let api = Arc::clone(&self.api);
        self.spawn(token, async move {
            AppEvent::TaskForm(form::execute(&*api, request).await)
        });
    }

    fn weather_page(&self, token: CancelToken, request: WeatherPageRequest) {
        let api = Arc::clone(&self.api);
        self.spawn(token, async move {
            AppEvent::WeatherPage(execute_page(&*api, request).await)
        });
    }

    fn weather_form(&self, token: CancelToken, request: WeatherFormRequest) {
        let api = Arc::clone(&self.api);
        self.spawn(token, async move {
            AppEvent::WeatherForm(execute_form(&*api, request).await)
        });
    }
}

pub struct App {
    pub location: Location,
    pub screen: Screen,
    pub variant: Variant,
    pub cache: QueryCache,
    executor: Executor,
    rx: UnboundedReceiver<Completed>,
}

impl App {
    pub fn new(api: SharedBackend, variant: Variant, location: Location) -> App {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut app = App {
            location: Location::landing(),
            screen: Screen::Landing(Landing::default()),
            variant,
            cache: QueryCache::new(),
            executor: Executor { api, tx },
            rx,
        };
        app.navigate(location);
        app
    }

    /// Replaces the current screen. The old screen is dropped, which
    /// cancels everything it still had in flight.
    pub fn navigate(&mut self, location: Location) {
        info!(%location, "navigating");
        self.cache = QueryCache::new();
        self.screen = match location.route {
            Route::Landing => Screen::Landing(Landing {
                email: location.email.clone(),
            }),
            Route::Tasks => {
                let (page, request) = TaskPage::mount(&location.email);
                if let Some(request) = request {
                    self.executor.task_page(page.token(), request);
                }
                Screen::Tasks(page)
            }
            Route::Weather => {
                let (page, requests) = WeatherPage::mount(&location.email);
                for request in requests {
                    self.executor.weather_page(page.token(), request);
                }
                Screen::Weather(page)
            }
        };
        self.location = location;
    }

    pub fn logout(&mut self) {
        self.navigate(Location::landing());
    }

    pub fn drain_completed(&mut self) {
        while let Ok(completed) = self.rx.try_recv() {
            self.apply_completed(completed);
        }
    }

    pub fn apply_completed(&mut self, completed: Completed) {
        if completed.token.is_cancelled() {
            debug!(event = ?completed.event, "discarding result for a closed view");
            return;
        }
        let exec = &self.executor;
        match (&mut self.screen, completed.event) {
            (Screen::Tasks(page), AppEvent::TaskPage(outcome)) => {
                page.apply(outcome, &mut self.cache);
                if let Some(request) = page.poll_invalidation(&mut self.cache) {
                    exec.task_page(page.token(), request);
                }
            }
            (Screen::Tasks(page), AppEvent::TaskForm(outcome)) => {
                let Some(form) = page.form.as_mut() else {
                    return;
                };
                if let Some(signal) = form.apply(outcome) {
                    if let Some(request) = page.on_form_signal(signal) {
                        exec.task_page(page.token(), request);
                    }
                }
            }
            (Screen::Weather(page), AppEvent::WeatherPage(outcome)) => {
                if let Some(request) = page.apply(outcome) {
                    exec.weather_page(page.token(), request);
                }
            }
            (Screen::Weather(page), AppEvent::WeatherForm(outcome)) => {
                let Some(form) = page.form.as_mut() else {
                    return;
                };
                if let Some(signal) = form.apply(outcome) {
                    if let Some(request) = page.on_form_signal(signal) {
                        exec.weather_page(page.token(), request);
                    }
                }
            }
            (_, event) => debug!(?event, "result does not belong to the current screen"),
        }
    }

    /// Returns true when the app should quit.
    pub fn handle_input(&mut self, key: KeyEvent) -> bool {
        match self.screen {
            Screen::Landing(_) => self.handle_landing_input(key),
            Screen::Tasks(_) => self.handle_tasks_input(key),
            Screen::Weather(_) => self.handle_weather_input(key),
        }
    }

    fn handle_landing_input(&mut self, key: KeyEvent) -> bool {
        let Screen::Landing(landing) = &mut self.screen else {
            return false;
        };
        match key.code {
            KeyCode::Esc => return true,
            KeyCode::Enter => {
                let email = landing.email.trim().to_string();
                if !email.is_empty() {
                    self.navigate(Location::new(self.variant.route(), email));
                }
            }
            KeyCode::Char(c) => landing.email.push(c),
            KeyCode::Backspace => {
                landing.email.pop();
            }
            _ => {}
        }
        false
    }

    fn handle_tasks_input(&mut self, key: KeyEvent) -> bool {
        let Screen::Tasks(page) = &mut self.screen else {
            return false;
        };
        let exec = &self.executor;

        if page.notice.message().is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                page.notice.dismiss();
            }
            return false;
        }

        if let Some(form) = page.form.as_mut() {
            if form.notice.message().is_some() {
                if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                    form.notice.dismiss();
                }
                return false;
            }
            if form.suggested_category().is_some() {
                match key.code {
                    KeyCode::Char('y') | KeyCode::Enter => {
                        if let Some(request) = form.confirm_suggested_category() {
                            exec.task_form(form.token(), request);
                        }
                    }
                    KeyCode::Char('n') | KeyCode::Esc => form.decline_suggested_category(),
                    _ => {}
                }
                return false;
            }
            let request = match key.code {
                KeyCode::Esc => {
                    page.close_form();
                    return false;
                }
                KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    form.suggest_category()
                }
                KeyCode::Enter => form.submit(),
                KeyCode::Tab | KeyCode::Down => {
                    form.next_field();
                    None
                }
                KeyCode::BackTab | KeyCode::Up => {
                    form.previous_field();
                    None
                }
                KeyCode::Left => {
                    form.cycle(false);
                    None
                }
                KeyCode::Right => {
                    form.cycle(true);
                    None
                }
                KeyCode::Char(' ') if !form.focus.is_text() => {
                    form.cycle(true);
                    None
                }
                KeyCode::Char(c) => {
                    form.input_char(c);
                    None
                }
                KeyCode::Backspace => {
                    form.backspace();
                    None
                }
                _ => None,
            };
            if let Some(request) = request {
                exec.task_form(form.token(), request);
            }
            return false;
        }

        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('L') => self.logout(),
            KeyCode::Char('j') | KeyCode::Down => page.next(),
            KeyCode::Char('k') | KeyCode::Up => page.previous(),
            KeyCode::Char('a') => {
                if let Some(request) = page.toggle_create(&self.cache) {
                    if let Some(form) = page.form.as_ref() {
                        exec.task_form(form.token(), request);
                    }
                }
            }
            KeyCode::Char('e') | KeyCode::Enter => {
                if let Some(request) = page.edit_selected() {
                    if let Some(form) = page.form.as_ref() {
                        exec.task_form(form.token(), request);
                    }
                }
            }
            KeyCode::Char('d') => {
                if let Some(request) = page.delete_selected() {
                    exec.task_page(page.token(), request);
                }
            }
            KeyCode::Char('r') => {
                if let Some(request) = page.refetch() {
                    exec.task_page(page.token(), request);
                }
            }
            _ => {}
        }
        false
    }

    fn handle_weather_input(&mut self, key: KeyEvent) -> bool {
        let Screen::Weather(page) = &mut self.screen else {
            return false;
        };
        let exec = &self.executor;

        if page.notice.message().is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                page.notice.dismiss();
            }
            return false;
        }

        if let Some(edit) = page.label_edit.as_mut() {
            match key.code {
                KeyCode::Esc => page.label_edit = None,
                KeyCode::Enter => {
                    if let Some(request) = page.save_label_edit() {
                        exec.weather_page(page.token(), request);
                    }
                }
                KeyCode::Char(c) => edit.text.push(c),
                KeyCode::Backspace => {
                    edit.text.pop();
                }
                _ => {}
            }
            return false;
        }

        if let Some(form) = page.form.as_mut() {
            if form.notice.message().is_some() {
                if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                    form.notice.dismiss();
                }
                return false;
            }
            let request = match key.code {
                KeyCode::Esc => {
                    page.toggle_create();
                    return false;
                }
                KeyCode::Tab => {
                    form.toggle_field();
                    None
                }
                KeyCode::Up | KeyCode::Down if form.focus == WeatherField::City => {
                    form.browse_history(&page.history, key.code == KeyCode::Down);
                    None
                }
                KeyCode::Enter => match form.focus {
                    WeatherField::City => form.lookup(),
                    WeatherField::CustomName => form.save(),
                },
                KeyCode::Char(c) => {
                    form.input_char(c);
                    None
                }
                KeyCode::Backspace => {
                    form.backspace();
                    None
                }
                _ => None,
            };
            if let Some(request) = request {
                exec.weather_form(form.token(), request);
            }
            return false;
        }

        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('L') => self.logout(),
            KeyCode::Char('j') | KeyCode::Down => page.next(),
            KeyCode::Char('k') | KeyCode::Up => page.previous(),
            KeyCode::Char('a') => page.toggle_create(),
            KeyCode::Char('d') => {
                if let Some(request) = page.delete_selected() {
                    exec.weather_page(page.token(), request);
                }
            }
            KeyCode::Char('e') => page.begin_label_edit(),
            KeyCode::Char('s') => page.list.sort_by(SortKey::Name),
            KeyCode::Char('t') => page.list.sort_by(SortKey::Temperature),
            KeyCode::Char('c') => page.list.sort_by(SortKey::Condition),
            KeyCode::Char('o') => page.list.toggle_order(),
            KeyCode::Char('u') => {
                let selected = page.selected;
                page.list.toggle_units(selected);
            }
            KeyCode::Char('r') => {
                if let Some(request) = page.refetch() {
                    exec.weather_page(page.token(), request);
                }
            }
            _ => {}
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Task, Weather};
    use crate::page::LoadStatus;
    use crate::testing::{location, FakeBackend};
    use crossterm::event::{KeyEventKind, KeyEventState};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_input(key(KeyCode::Char(c)));
        }
    }

    fn task(id: u64, category_id: u64, category: &str) -> Task {
        Task {
            id,
            title: format!("task {}", id),
            description: "d".to_string(),
            category: Category::new(category_id, category),
            ..Task::default()
        }
    }

    /// Waits for `n` completions and applies them in arrival order.
    async fn settle(app: &mut App, n: usize) {
        for _ in 0..n {
            let completed = app.rx.recv().await.unwrap();
            app.apply_completed(completed);
        }
    }

    fn task_page(app: &App) -> &TaskPage {
        match &app.screen {
            Screen::Tasks(page) => page,
            _ => panic!("not on the task screen"),
        }
    }

    fn task_ids(app: &App) -> Vec<u64> {
        task_page(app).groups().flatten().map(|t| t.id).collect()
    }

    #[tokio::test]
    async fn test_landing_requires_an_email() {
        let api = Arc::new(FakeBackend::default());
        let mut app = App::new(api.clone(), Variant::Tasks, Location::landing());

        app.handle_input(key(KeyCode::Enter));
        assert!(matches!(app.screen, Screen::Landing(_)));

        type_text(&mut app, "a b@example.com");
        app.handle_input(key(KeyCode::Enter));
        assert!(matches!(app.screen, Screen::Tasks(_)));
        assert_eq!(app.location.to_string(), "/tasks?email=a+b%40example.com");

        settle(&mut app, 1).await;
        assert_eq!(task_page(&app).status, LoadStatus::Ready);
        assert_eq!(api.call_count("list_tasks_for_user"), 1);
    }

    #[tokio::test]
    async fn test_weather_variant_routes_to_weather_screen() {
        let api = Arc::new(FakeBackend::default());
        let mut app = App::new(api.clone(), Variant::Weather, Location::landing());
        type_text(&mut app, "me@example.com");
        app.handle_input(key(KeyCode::Enter));
        assert!(matches!(app.screen, Screen::Weather(_)));
        settle(&mut app, 2).await;
        assert_eq!(api.call_count("get_search_history"), 1);
    }

    #[tokio::test]
    async fn test_empty_identity_skips_fetch() {
        let api = Arc::new(FakeBackend::default());
        let app = App::new(api.clone(), Variant::Tasks, Location::new(Route::Tasks, ""));
        assert_eq!(task_page(&app).status, LoadStatus::Idle);
        tokio::task::yield_now().await;
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_key_removes_item_after_refetch() {
        let api = Arc::new(FakeBackend::default());
        api.seed_tasks(
            "me@example.com",
            vec![task(1, 1, "Work"), task(2, 1, "Work"), task(3, 2, "Home")],
        );
        let mut app = App::new(
            api.clone(),
            Variant::Tasks,
            Location::new(Route::Tasks, "me@example.com"),
        );
        settle(&mut app, 1).await;
        assert_eq!(task_ids(&app), [1, 2, 3]);

        app.handle_input(key(KeyCode::Char('j')));
        app.handle_input(key(KeyCode::Char('d')));
        assert!(task_page(&app).is_deleting(2));
        // delete, then the refetch it triggers
        settle(&mut app, 2).await;

        assert_eq!(task_ids(&app), [1, 3]);
        assert_eq!(api.call_count("list_tasks_for_user"), 2);
    }

    #[tokio::test]
    async fn test_results_for_a_left_screen_are_discarded() {
        let api = Arc::new(FakeBackend::default());
        let mut app = App::new(
            api.clone(),
            Variant::Tasks,
            Location::new(Route::Tasks, "old@example.com"),
        );
        let stale = task_page(&app).token();

        app.navigate(Location::new(Route::Tasks, ""));
        assert!(stale.is_cancelled());

        app.apply_completed(Completed {
            token: stale,
            event: AppEvent::TaskPage(PageOutcome::Fetched(Ok(vec![task(7, 1, "Work")]))),
        });
        assert!(task_ids(&app).is_empty());
        assert!(app.cache.categories().is_empty());
    }

    #[tokio::test]
    async fn test_logout_returns_to_landing() {
        let api = Arc::new(FakeBackend::default());
        let mut app = App::new(
            api.clone(),
            Variant::Tasks,
            Location::new(Route::Tasks, "me@example.com"),
        );
        app.handle_input(key(KeyCode::Char('L')));
        assert!(matches!(app.screen, Screen::Landing(_)));
        assert_eq!(app.location, Location::landing());
    }

    #[tokio::test]
    async fn test_create_through_keys_shows_success_notice() {
        let api = Arc::new(FakeBackend::default());
        api.seed_tasks("me@example.com", vec![task(1, 1, "Work")]);
        api.seed_categories(vec![Category::new(1, "Work")]);
        let mut app = App::new(
            api.clone(),
            Variant::Tasks,
            Location::new(Route::Tasks, "me@example.com"),
        );
        settle(&mut app, 1).await;

        app.handle_input(key(KeyCode::Char('a')));
        settle(&mut app, 1).await;
        type_text(&mut app, "Call");
        app.handle_input(key(KeyCode::Tab));
        type_text(&mut app, "the bank");
        app.handle_input(key(KeyCode::BackTab));
        app.handle_input(key(KeyCode::BackTab));
        app.handle_input(key(KeyCode::Right));
        app.handle_input(key(KeyCode::Enter));
        // save, then the page refetch
        settle(&mut app, 2).await;

        let page = task_page(&app);
        assert!(page.form.is_none());
        assert_eq!(page.notice.message(), Some(form::MSG_CREATED));
        assert_eq!(page.groups().get("Work").map(|g| g.len()), Some(2));

        app.handle_input(key(KeyCode::Enter));
        assert_eq!(task_page(&app).notice.message(), None);
    }

    #[tokio::test]
    async fn test_weather_sort_keys() {
        let api = Arc::new(FakeBackend::default());
        let saved = |id: u64, city: &str| Weather {
            id,
            description: city.to_string(),
            status: "me@example.com".to_string(),
            ..Weather::default()
        };
        api.seed_weather(vec![saved(1, "Oslo"), saved(2, "Cairo"), saved(3, "Lima")]);
        api.add_location("Oslo", location("Oslo", 20.0, "rain"));
        api.add_location("Cairo", location("Cairo", 30.0, "clear"));
        api.add_location("Lima", location("Lima", 10.0, "fog"));
        let mut app = App::new(
            api.clone(),
            Variant::Weather,
            Location::new(Route::Weather, "me@example.com"),
        );
        settle(&mut app, 2).await;

        let temps = |app: &App| match &app.screen {
            Screen::Weather(page) => page
                .list
                .cards()
                .iter()
                .map(|c| c.data.main.temp)
                .collect::<Vec<_>>(),
            _ => Vec::new(),
        };
        app.handle_input(key(KeyCode::Char('t')));
        assert_eq!(temps(&app), [10.0, 20.0, 30.0]);
        app.handle_input(key(KeyCode::Char('o')));
        assert_eq!(temps(&app), [30.0, 20.0, 10.0]);
    }
}
