//! Running tasks and the foreground task.

use std::sync::Arc;

use crate::components::{Component, ComponentContext, Subscriptions, accept, acknowledged, follow_up};
use crate::error::LinkError;
use crate::event::Property;
use crate::protocol::{
    Command, SuccessData, TYPE_FOREGROUND_TASK, TYPE_LIST_TASKS, TYPE_REMOVE_TASK, TYPE_SWITCH_TASK,
    TaskData,
};
use crate::sender::CommandSender;

const NAME: &str = "tasks";

/// Task list and foreground task.
///
/// Every list reply replaces [`tasks`](Self::tasks) wholesale. A successful
/// switch re-queries the foreground task and a successful remove re-lists.
#[derive(Debug)]
pub struct Tasks {
    sender: CommandSender,
    subs: Subscriptions,
    state: Arc<TaskState>,
}

#[derive(Debug, Default)]
struct TaskState {
    tasks: Property<Vec<TaskData>>,
    foreground: Property<Option<TaskData>>,
}

impl Tasks {
    /// Tasks from the latest list reply, in board order.
    pub fn tasks(&self) -> &Property<Vec<TaskData>> {
        &self.state.tasks
    }

    /// `None` until the board first reports a foreground task.
    pub fn foreground(&self) -> &Property<Option<TaskData>> {
        &self.state.foreground
    }

    pub fn list(&self) -> Result<(), LinkError> {
        self.sender.send(&Command::tasks_list())
    }

    pub fn refresh_foreground(&self) -> Result<(), LinkError> {
        self.sender.send(&Command::tasks_foreground())
    }

    /// Bring `task_id` to the front.
    pub fn switch_to(&self, task_id: i32) -> Result<(), LinkError> {
        self.sender.send(&Command::tasks_switch(task_id))
    }

    /// Close `task_id`.
    pub fn remove(&self, task_id: i32) -> Result<(), LinkError> {
        self.sender.send(&Command::tasks_remove(task_id))
    }
}

impl Component for Tasks {
    fn create(ctx: ComponentContext) -> Self {
        let state = Arc::new(TaskState::default());
        let subs = ctx.subscriptions();

        let s = Arc::clone(&state);
        subs.on::<Vec<TaskData>>(TYPE_LIST_TASKS, move |resp| {
            if let Some(list) = accept(NAME, resp) {
                s.tasks.set(list.clone());
            }
        });

        let s = Arc::clone(&state);
        subs.on::<TaskData>(TYPE_FOREGROUND_TASK, move |resp| {
            if let Some(task) = accept(NAME, resp) {
                s.foreground.set(Some(task.clone()));
            }
        });

        let sender = ctx.sender().clone();
        subs.on::<SuccessData>(TYPE_SWITCH_TASK, move |resp| {
            if acknowledged(NAME, resp).is_ok() {
                follow_up(NAME, &sender, &Command::tasks_foreground());
            }
        });

        let sender = ctx.sender().clone();
        subs.on::<SuccessData>(TYPE_REMOVE_TASK, move |resp| {
            if acknowledged(NAME, resp).is_ok() {
                follow_up(NAME, &sender, &Command::tasks_list());
            }
        });

        Self { sender: ctx.sender().clone(), subs, state }
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn initialize(&self) -> Result<(), LinkError> {
        self.list()?;
        self.refresh_foreground()
    }

    fn dispose(&self) {
        self.subs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::testing::{context, record};

    const TWO_TASKS: &str = r#"{"type":"ListTasksResponse","value":[
        {"taskId":5,"stackId":1,"lastActiveTime":1700000000000,"topActivity":"com.a/.Main"},
        {"taskId":9,"stackId":0,"lastActiveTime":1700000001000,"topActivity":"com.b/.Home"}]}"#;

    #[test]
    fn list_replaces_whole_collection() {
        let (_wire, ctx) = context();
        let dispatcher = ctx.dispatcher().clone();
        let tasks = Tasks::create(ctx);
        let seen = record(tasks.tasks().changed());

        dispatcher.handle_incoming(&TWO_TASKS.replace('\n', ""));
        dispatcher.handle_incoming(
            r#"{"type":"ListTasksResponse","value":[{"taskId":9,"topActivity":"com.b/.Home"}]}"#,
        );

        let current = tasks.tasks().get();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].task_id, 9);
        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn identical_list_is_silent() {
        let (_wire, ctx) = context();
        let dispatcher = ctx.dispatcher().clone();
        let tasks = Tasks::create(ctx);
        let seen = record(tasks.tasks().changed());
        let line = TWO_TASKS.replace('\n', "");
        dispatcher.handle_incoming(&line);
        dispatcher.handle_incoming(&line);
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn successful_switch_requeries_foreground() {
        let (wire, ctx) = context();
        let dispatcher = ctx.dispatcher().clone();
        let tasks = Tasks::create(ctx);

        tasks.switch_to(9).unwrap();
        dispatcher.handle_incoming(r#"{"type":"SwitchTaskResponse","value":{"success":true}}"#);
        assert_eq!(wire.take(), ["vm tasks -s 9", "vm tasks -f"]);

        dispatcher.handle_incoming(
            r#"{"type":"ForegroundTaskResponse","value":{"taskId":9,"topActivity":"com.b/.Home"}}"#,
        );
        assert_eq!(tasks.foreground().get().map(|t| t.task_id), Some(9));
    }

    #[test]
    fn failed_switch_sends_nothing_more() {
        let (wire, ctx) = context();
        let dispatcher = ctx.dispatcher().clone();
        let _tasks = Tasks::create(ctx);
        dispatcher.handle_incoming(r#"{"type":"SwitchTaskResponse","error":{"code":"4","message":"no such task"}}"#);
        assert!(wire.take().is_empty());
    }

    #[test]
    fn unacknowledged_switch_or_remove_sends_nothing_more() {
        let (wire, ctx) = context();
        let dispatcher = ctx.dispatcher().clone();
        let _tasks = Tasks::create(ctx);
        dispatcher.handle_incoming(r#"{"type":"SwitchTaskResponse","value":{"success":false}}"#);
        dispatcher.handle_incoming(r#"{"type":"RemoveTaskResponse","value":{"success":false}}"#);
        assert!(wire.take().is_empty());
    }

    #[test]
    fn remove_relists() {
        let (wire, ctx) = context();
        let dispatcher = ctx.dispatcher().clone();
        let tasks = Tasks::create(ctx);
        tasks.remove(5).unwrap();
        dispatcher.handle_incoming(r#"{"type":"RemoveTaskResponse","value":{"success":true}}"#);
        assert_eq!(wire.take(), ["vm tasks -r 5", "vm tasks -l"]);
    }

    #[test]
    fn initialize_lists_and_queries_foreground() {
        let (wire, ctx) = context();
        Tasks::create(ctx).initialize().unwrap();
        assert_eq!(wire.take(), ["vm tasks -l", "vm tasks -f"]);
    }
}
