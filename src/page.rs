use crate::api::TaskApi;
use crate::cache::{QueryCache, QueryScope};
use crate::cancel::{CancelToken, Lifetime};
use crate::error::ApiError;
use crate::form::{FormRequest, FormSignal, Notice, TaskForm};
use crate::models::Task;
use crate::reconcile::{reconcile, Grouped};
use std::collections::HashSet;
use tracing::{debug, error, info};

pub const MSG_LOAD_ERROR: &str = "Error loading data. Please try again later.";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoadStatus {
    /// Nothing requested yet, e.g. no identity.
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PageRequest {
    Fetch { email: String },
    Delete { id: u64 },
}

#[derive(Debug)]
pub enum PageOutcome {
    Fetched(Result<Vec<Task>, ApiError>),
    Deleted { id: u64, result: Result<(), ApiError> },
}

pub async fn execute<A>(api: &A, request: PageRequest) -> PageOutcome
where
    A: TaskApi + ?Sized,
{
    match request {
        PageRequest::Fetch { email } => PageOutcome::Fetched(api.list_tasks_for_user(&email).await),
        PageRequest::Delete { id } => PageOutcome::Deleted {
            id,
            result: api.delete_task(id).await,
        },
    }
}

/// The task screen for one acting user.
#[derive(Debug)]
pub struct TaskPage {
    email: String,
    pub status: LoadStatus,
    groups: Grouped<Task>,
    pub form: Option<TaskForm>,
    pub selected: usize,
    deleting: HashSet<u64>,
    pub notice: Notice,
    lifetime: Lifetime,
}

impl TaskPage {
    pub fn mount(email: &str) -> (Self, Option<PageRequest>) {
        let mut page = TaskPage {
            email: email.to_string(),
            status: LoadStatus::Idle,
            groups: Grouped::default(),
            form: None,
            selected: 0,
            deleting: HashSet::new(),
            notice: Notice::default(),
            lifetime: Lifetime::new(),
        };
        let request = page.refetch();
        (page, request)
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn groups(&self) -> &Grouped<Task> {
        &self.groups
    }

    pub fn token(&self) -> CancelToken {
        self.lifetime.token()
    }

    pub fn is_deleting(&self, id: u64) -> bool {
        self.deleting.contains(&id)
    }

    /// Skipped while the identity is empty.
    pub fn refetch(&mut self) -> Option<PageRequest> {
        if self.email.is_empty() {
            debug!("no identity, skipping task fetch");
            return None;
        }
        if self.status != LoadStatus::Ready {
            self.status = LoadStatus::Loading;
        }
        Some(PageRequest::Fetch {
            email: self.email.clone(),
        })
    }

    /// Picks up invalidations made by item actions.
    pub fn poll_invalidation(&mut self, cache: &mut QueryCache) -> Option<PageRequest> {
        if cache.take_invalidated(QueryScope::Tasks) {
            self.refetch()
        } else {
            None
        }
    }

    pub fn apply(&mut self, outcome: PageOutcome, cache: &mut QueryCache) {
        match outcome {
            PageOutcome::Fetched(Ok(tasks)) => {
                info!(count = tasks.len(), "tasks loaded");
                let reconciled = reconcile(tasks);
                cache.publish_categories(reconciled.categories);
                self.groups = reconciled.groups;
                self.status = LoadStatus::Ready;
                let len = self.groups.item_count();
                if self.selected >= len {
                    self.selected = len.saturating_sub(1);
                }
            }
            PageOutcome::Fetched(Err(err)) => {
                error!(error = %err, "error loading tasks");
                self.status = LoadStatus::Failed;
            }
            PageOutcome::Deleted { id, result } => {
                self.deleting.remove(&id);
                match result {
                    Ok(()) => cache.invalidate(QueryScope::Tasks),
                    Err(err) => error!(id, error = %err, "failed to delete task"),
                }
            }
        }
    }

    pub fn selected_task(&self) -> Option<&Task> {
        self.groups.flatten().nth(self.selected)
    }

    pub fn next(&mut self) {
        let len = self.groups.item_count();
        if len > 0 {
            self.selected = if self.selected >= len - 1 { 0 } else { self.selected + 1 };
        }
    }

    pub fn previous(&mut self) {
        let len = self.groups.item_count();
        if len > 0 {
            self.selected = if self.selected == 0 { len - 1 } else { self.selected - 1 };
        }
    }

    /// Opens the create form, or closes it if it is already open.
    pub fn toggle_create(&mut self, cache: &QueryCache) -> Option<FormRequest> {
        if self.form.take().is_some() {
            return None;
        }
        self.notice.dismiss();
        let form = TaskForm::new(None, cache.categories(), &self.email);
        let preload = form.preload();
        self.form = Some(form);
        Some(preload)
    }

    pub fn edit_selected(&mut self) -> Option<FormRequest> {
        let task = self.selected_task()?.clone();
        self.notice.dismiss();
        let seed = [task.category.clone()];
        let form = TaskForm::new(Some(task), &seed, &self.email);
        let preload = form.preload();
        self.form = Some(form);
        Some(preload)
    }

    pub fn close_form(&mut self) {
        self.form = None;
    }

    pub fn delete_selected(&mut self) -> Option<PageRequest> {
        let id = self.selected_task()?.id;
        if !self.deleting.insert(id) {
            return None;
        }
        Some(PageRequest::Delete { id })
    }

    pub fn on_form_signal(&mut self, signal: FormSignal) -> Option<PageRequest> {
        match signal {
            FormSignal::Saved { message } => {
                self.form = None;
                self.notice.show(message);
                self.refetch()
            }
        }
    }
}
