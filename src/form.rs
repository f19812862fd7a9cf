use crate::api::{CategoryApi, TaskApi};
use crate::cancel::{CancelToken, Lifetime};
use crate::error::ApiError;
use crate::models::{Category, Priority, Status, Task};
use crate::parser::normalize_due_date;
use crate::reconcile::{find_by_name, merge_categories};
use tracing::{debug, error, warn};

pub const MSG_NEED_DESCRIPTION: &str = "Please provide a task description to suggest a category.";
pub const MSG_SUGGEST_FAILED: &str = "Failed to suggest category. Please try again.";
pub const MSG_CREATE_CATEGORY_FAILED: &str = "Failed to create new category. Please try again.";
pub const MSG_SELECT_CATEGORY: &str = "Please select a category.";
pub const MSG_MISSING_EMAIL: &str = "User email is missing.";
pub const MSG_MISSING_FIELDS: &str = "Please provide a title and a description.";
pub const MSG_BAD_DUE_DATE: &str = "Please enter the due date as YYYY-MM-DD.";
pub const MSG_CREATED: &str = "Task created successfully!";
pub const MSG_UPDATED: &str = "Task updated successfully!";
pub const MSG_CREATE_FAILED: &str = "Failed to create task. Please try again.";
pub const MSG_UPDATE_FAILED: &str = "Failed to update task. Please try again.";

/// Single message slot. Showing a message replaces the previous one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Notice {
    message: Option<String>,
}

impl Notice {
    pub fn show(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub fn dismiss(&mut self) {
        self.message = None;
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormField {
    Title,
    Description,
    DueDate,
    Priority,
    Status,
    Category,
}

impl FormField {
    const ORDER: [FormField; 6] = [
        FormField::Title,
        FormField::Description,
        FormField::DueDate,
        FormField::Priority,
        FormField::Status,
        FormField::Category,
    ];

    fn step(self, forward: bool) -> FormField {
        let i = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        let len = Self::ORDER.len();
        let next = if forward { (i + 1) % len } else { (i + len - 1) % len };
        Self::ORDER[next]
    }

    pub fn is_text(self) -> bool {
        matches!(self, FormField::Title | FormField::Description | FormField::DueDate)
    }
}

/// A remote call the form wants made on its behalf.
#[derive(Clone, Debug, PartialEq)]
pub enum FormRequest {
    LoadCategories,
    Suggest { description: String },
    CreateCategory { name: String },
    Create { task: Task, email: String },
    Update { id: u64, task: Task },
}

#[derive(Debug)]
pub enum FormOutcome {
    CategoriesLoaded(Result<Vec<Category>, ApiError>),
    Suggested(Result<String, ApiError>),
    CategoryCreated(Result<Category, ApiError>),
    Saved(Result<Task, ApiError>),
}

/// What the owning page has to do after an outcome was applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormSignal {
    /// Refetch and close the form; the message goes to the page.
    Saved { message: String },
}

pub async fn execute<A>(api: &A, request: FormRequest) -> FormOutcome
where
    A: TaskApi + CategoryApi + ?Sized,
{
    match request {
        FormRequest::LoadCategories => FormOutcome::CategoriesLoaded(api.list_categories().await),
        FormRequest::Suggest { description } => {
            FormOutcome::Suggested(api.suggest_category(&description).await)
        }
        FormRequest::CreateCategory { name } => {
            FormOutcome::CategoryCreated(api.create_category(&name).await)
        }
        FormRequest::Create { task, email } => {
            FormOutcome::Saved(api.create_task(&task, &email).await)
        }
        FormRequest::Update { id, task } => FormOutcome::Saved(api.update_task(id, &task).await),
    }
}

/// Editable state of one task plus the category suggestion flow.
#[derive(Debug)]
pub struct TaskForm {
    existing: Option<Task>,
    identity: String,
    pub title: String,
    pub description: String,
    pub due_date: String,
    pub priority: Priority,
    pub status: Status,
    pub category_id: Option<u64>,
    categories: Vec<Category>,
    pub is_submitting: bool,
    pub is_suggesting_category: bool,
    pub is_creating_category: bool,
    suggested_category: Option<String>,
    pub notice: Notice,
    pub focus: FormField,
    lifetime: Lifetime,
}

impl TaskForm {
    /// `seed` is copied once; later refetches by the page don't reach an
    /// open form.
    pub fn new(existing: Option<Task>, seed: &[Category], identity: &str) -> Self {
        let mut categories = Vec::new();
        merge_categories(&mut categories, seed.iter().cloned());

        let (title, description, due_date, priority, status, category_id) = match &existing {
            Some(task) => (
                task.title.clone(),
                task.description.clone(),
                normalize_due_date(&task.due_date),
                task.priority,
                task.status,
                Some(task.category.id),
            ),
            None => (
                String::new(),
                String::new(),
                String::new(),
                Priority::Normal,
                Status::Ongoing,
                None,
            ),
        };

        TaskForm {
            existing,
            identity: identity.to_string(),
            title,
            description,
            due_date,
            priority,
            status,
            category_id,
            categories,
            is_submitting: false,
            is_suggesting_category: false,
            is_creating_category: false,
            suggested_category: None,
            notice: Notice::default(),
            focus: FormField::Title,
            lifetime: Lifetime::new(),
        }
    }

    pub fn is_edit(&self) -> bool {
        self.existing.is_some()
    }

    pub fn heading(&self) -> &'static str {
        if self.is_edit() {
            "Edit Task"
        } else {
            "Create New Task"
        }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn selected_category(&self) -> Option<&Category> {
        let id = self.category_id?;
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn suggested_category(&self) -> Option<&str> {
        self.suggested_category.as_deref()
    }

    pub fn token(&self) -> CancelToken {
        self.lifetime.token()
    }

    pub fn preload(&self) -> FormRequest {
        FormRequest::LoadCategories
    }

    pub fn suggest_category(&mut self) -> Option<FormRequest> {
        if self.is_suggesting_category {
            return None;
        }
        if self.description.is_empty() {
            self.notice.show(MSG_NEED_DESCRIPTION);
            return None;
        }
        self.is_suggesting_category = true;
        Some(FormRequest::Suggest {
            description: self.description.clone(),
        })
    }

    pub fn confirm_suggested_category(&mut self) -> Option<FormRequest> {
        let suggestion = self.suggested_category.take()?;

        if let Some(existing) = find_by_name(&self.categories, &suggestion) {
            debug!(id = existing.id, name = %existing.name, "suggestion matches known category");
            self.category_id = Some(existing.id);
            return None;
        }

        self.is_creating_category = true;
        Some(FormRequest::CreateCategory { name: suggestion })
    }

    pub fn decline_suggested_category(&mut self) {
        self.suggested_category = None;
    }

    pub fn submit(&mut self) -> Option<FormRequest> {
        if self.is_submitting {
            return None;
        }
        let Some(category_id) = self.category_id else {
            self.notice.show(MSG_SELECT_CATEGORY);
            return None;
        };
        if self.identity.is_empty() {
            self.notice.show(MSG_MISSING_EMAIL);
            return None;
        }
        if self.title.trim().is_empty() || self.description.trim().is_empty() {
            self.notice.show(MSG_MISSING_FIELDS);
            return None;
        }
        let due_date = normalize_due_date(&self.due_date);
        if due_date.is_empty() && !self.due_date.trim().is_empty() {
            self.notice.show(MSG_BAD_DUE_DATE);
            return None;
        }
        self.due_date = due_date;

        self.is_submitting = true;
        let request = match &self.existing {
            Some(existing) => FormRequest::Update {
                id: existing.id,
                task: Task {
                    title: self.title.clone(),
                    description: self.description.clone(),
                    due_date: self.due_date.clone(),
                    priority: self.priority,
                    status: self.status,
                    category: Category::reference(category_id),
                    ..existing.clone()
                },
            },
            None => FormRequest::Create {
                task: Task {
                    id: 0,
                    title: self.title.clone(),
                    description: self.description.clone(),
                    due_date: self.due_date.clone(),
                    priority: self.priority,
                    status: self.status,
                    category: Category::reference(category_id),
                },
                email: self.identity.clone(),
            },
        };
        Some(request)
    }

    pub fn apply(&mut self, outcome: FormOutcome) -> Option<FormSignal> {
        match outcome {
            FormOutcome::CategoriesLoaded(Ok(categories)) => {
                merge_categories(&mut self.categories, categories);
            }
            FormOutcome::CategoriesLoaded(Err(err)) => {
                warn!(error = %err, "error fetching categories");
            }
            FormOutcome::Suggested(result) => {
                self.is_suggesting_category = false;
                match result {
                    Ok(suggestion) => self.suggested_category = Some(suggestion),
                    Err(err) => {
                        error!(error = %err, "failed to suggest category");
                        self.notice.show(MSG_SUGGEST_FAILED);
                    }
                }
            }
            FormOutcome::CategoryCreated(result) => {
                self.is_creating_category = false;
                match result {
                    Ok(category) => {
                        // A preload may have brought the same name in meanwhile.
                        let known = find_by_name(&self.categories, &category.name)
                            .or_else(|| self.categories.iter().find(|c| c.id == category.id))
                            .map(|c| c.id);
                        match known {
                            Some(id) => self.category_id = Some(id),
                            None => {
                                self.category_id = Some(category.id);
                                self.categories.push(category);
                            }
                        }
                    }
                    Err(err) => {
                        error!(error = %err, "failed to create category");
                        self.notice.show(MSG_CREATE_CATEGORY_FAILED);
                    }
                }
            }
            FormOutcome::Saved(result) => {
                self.is_submitting = false;
                match result {
                    Ok(task) => {
                        debug!(id = task.id, "task saved");
                        let message = if self.is_edit() { MSG_UPDATED } else { MSG_CREATED };
                        self.notice.show(message);
                        return Some(FormSignal::Saved {
                            message: message.to_string(),
                        });
                    }
                    Err(err) => {
                        let (log, message) = if self.is_edit() {
                            ("failed to update task", MSG_UPDATE_FAILED)
                        } else {
                            ("failed to create task", MSG_CREATE_FAILED)
                        };
                        error!(error = %err, "{}", log);
                        self.notice.show(message);
                    }
                }
            }
        }
        None
    }

    pub fn next_field(&mut self) {
        self.focus = self.focus.step(true);
    }

    pub fn previous_field(&mut self) {
        self.focus = self.focus.step(false);
    }

    pub fn input_char(&mut self, c: char) {
        match self.focus {
            FormField::Title => self.title.push(c),
            FormField::Description => self.description.push(c),
            FormField::DueDate => self.due_date.push(c),
            _ => {}
        }
    }

    pub fn backspace(&mut self) {
        match self.focus {
            FormField::Title => {
                self.title.pop();
            }
            FormField::Description => {
                self.description.pop();
            }
            FormField::DueDate => {
                self.due_date.pop();
            }
            _ => {}
        }
    }

    /// Left/right on a select field.
    pub fn cycle(&mut self, forward: bool) {
        match self.focus {
            FormField::Priority => self.priority = self.priority.toggled(),
            FormField::Status => self.status = self.status.toggled(),
            FormField::Category => self.cycle_category(forward),
            _ => {}
        }
    }

    fn cycle_category(&mut self, forward: bool) {
        if self.categories.is_empty() {
            return;
        }
        let len = self.categories.len();
        let current = self
            .category_id
            .and_then(|id| self.categories.iter().position(|c| c.id == id));
        let next = match current {
            Some(i) if forward => (i + 1) % len,
            Some(i) => (i + len - 1) % len,
            None => 0,
        };
        self.category_id = Some(self.categories[next].id);
    }
}
