//! Tasks linked to opportunities and workfiles
//!
//! The link is a weak reference (`RelatedTo`): a task survives its target, and
//! the target never owns its tasks. Declaring an opportunity a total loss
//! escalates its tasks inside the status change itself. [`TaskCarryOver`]
//! (opt-in) is an event subscriber moving an opportunity's open tasks onto the
//! workfile created from it.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::error::{GuardFailure, LifecycleResult};
use crate::core::events::{EventSink, LifecycleEvent};
use crate::core::identity::{OpportunityId, TaskId, WorkfileId};
use crate::core::shop::Shop;
use crate::core::store::Repository;
use crate::entities::{Priority, RelatedTo, Task, TaskStatus, WorkfileStatus};

/// Fields for a new task
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    /// Falls back to the configured default owner
    pub owner: Option<String>,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn estimated_hours(mut self, hours: f64) -> Self {
        self.estimated_hours = Some(hours);
        self
    }
}

/// Mark every task about `opportunity` urgent and attach `message`
///
/// Returns how many tasks changed.
pub(crate) fn escalate_related_tasks(
    repo: &Repository,
    opportunity: &OpportunityId,
    message: &str,
) -> LifecycleResult<usize> {
    let mut changed = 0;
    for handle in repo.related_task_handles(&RelatedTo::Opportunity(opportunity.clone())) {
        let mut task = handle.lock();
        let mut next = task.clone();
        next.priority = Priority::Urgent;
        next.message = Some(message.to_string());
        if next != *task {
            repo.commit_task(&mut task, next)?;
            changed += 1;
        }
    }
    Ok(changed)
}

/// Rewrite open opportunity tasks to point at the workfile
pub(crate) fn carry_over_tasks(
    repo: &Repository,
    opportunity: &OpportunityId,
    workfile: &WorkfileId,
) -> LifecycleResult<usize> {
    let mut moved = 0;
    for handle in repo.related_task_handles(&RelatedTo::Opportunity(opportunity.clone())) {
        let mut task = handle.lock();
        if !task.is_live() || task.status == TaskStatus::Completed {
            continue;
        }
        let mut next = task.clone();
        next.related_to = Some(RelatedTo::Workfile(workfile.clone()));
        repo.commit_task(&mut task, next)?;
        moved += 1;
    }
    Ok(moved)
}

/// Moves open tasks onto a newly created workfile
pub struct TaskCarryOver {
    repo: Arc<Repository>,
}

impl TaskCarryOver {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }
}

impl EventSink for TaskCarryOver {
    fn notify(&self, event: &LifecycleEvent) {
        let LifecycleEvent::WorkfileCreated { id, opportunity_id } = event else {
            return;
        };
        match carry_over_tasks(&self.repo, opportunity_id, id) {
            Ok(count) => debug!(workfile = %id, count, "tasks carried over"),
            Err(e) => warn!(workfile = %id, error = %e, "task carry-over failed"),
        }
    }
}

pub struct TaskLinkage<'a> {
    shop: &'a Shop,
}

impl<'a> TaskLinkage<'a> {
    pub fn new(shop: &'a Shop) -> Self {
        Self { shop }
    }

    fn build(&self, new: NewTask, related_to: Option<RelatedTo>) -> Task {
        let owner = new
            .owner
            .unwrap_or_else(|| self.shop.config().default_owner.clone());
        let mut task = Task::new(new.title, owner, self.shop.now());
        task.description = new.description;
        task.priority = new.priority;
        task.due_date = new.due_date;
        task.estimated_hours = new.estimated_hours;
        task.related_to = related_to;
        task
    }

    fn insert(&self, task: Task) -> LifecycleResult<Task> {
        self.shop.repository().add_task(task.clone())?;
        info!(id = %task.id, related_to = ?task.related_to, "task created");
        Ok(task)
    }

    /// Task not tied to any record
    pub fn add_task(&self, new: NewTask) -> LifecycleResult<Task> {
        self.insert(self.build(new, None))
    }

    pub fn add_task_to_opportunity(&self, id: &OpportunityId, new: NewTask) -> LifecycleResult<Task> {
        self.shop.repository().opportunity_handle(id)?;
        self.insert(self.build(new, Some(RelatedTo::Opportunity(id.clone()))))
    }

    pub fn add_task_to_workfile(&self, id: &WorkfileId, new: NewTask) -> LifecycleResult<Task> {
        self.shop.repository().workfile_handle(id)?;
        self.insert(self.build(new, Some(RelatedTo::Workfile(id.clone()))))
    }

    pub fn update_task_status(&self, id: &TaskId, status: TaskStatus) -> LifecycleResult<Task> {
        self.shop.repository().modify_task(id, |task| {
            task.status = status;
            Ok(task.clone())
        })
    }

    pub fn remove_task(&self, id: &TaskId) -> LifecycleResult<Task> {
        let task = self.shop.repository().remove_task(id)?;
        info!(%id, "task removed");
        Ok(task)
    }

    /// Point an opportunity task at a workfile instead
    ///
    /// Tasks about anything other than an opportunity are left alone and
    /// report `Ok(false)`. The workfile must be live and created from the
    /// task's opportunity.
    pub fn convert_opportunity_task_to_workfile(
        &self,
        task_id: &TaskId,
        workfile_id: &WorkfileId,
    ) -> LifecycleResult<bool> {
        let repo = self.shop.repository();
        let handle = repo.workfile_handle(workfile_id)?;
        let workfile = handle.lock();
        repo.modify_task(task_id, |task| {
            let Some(RelatedTo::Opportunity(opportunity)) = &task.related_to else {
                debug!(id = %task.id, "not an opportunity task, left unchanged");
                return Ok(false);
            };
            if workfile.status == WorkfileStatus::Archived {
                return Err(GuardFailure::WorkfileArchived.into());
            }
            if &workfile.opportunity_id != opportunity {
                return Err(GuardFailure::WorkfileForOtherOpportunity {
                    workfile: workfile_id.clone(),
                    opportunity: opportunity.clone(),
                }
                .into());
            }
            task.related_to = Some(RelatedTo::Workfile(workfile_id.clone()));
            Ok(true)
        })
    }

    /// Same as [`Self::convert_opportunity_task_to_workfile`] but refusing
    /// non-opportunity tasks
    pub fn convert_strict(&self, task_id: &TaskId, workfile_id: &WorkfileId) -> LifecycleResult<()> {
        if self.convert_opportunity_task_to_workfile(task_id, workfile_id)? {
            Ok(())
        } else {
            Err(GuardFailure::NotOpportunityTask.into())
        }
    }

    /// Escalate the opportunity's tasks with the configured warning
    pub fn handle_total_loss(&self, id: &OpportunityId) -> LifecycleResult<usize> {
        escalate_related_tasks(
            self.shop.repository(),
            id,
            &self.shop.config().tasks.total_loss_message,
        )
    }

    pub fn tasks_for(&self, target: &RelatedTo) -> Vec<Task> {
        self.shop.tasks_for(target)
    }
}
