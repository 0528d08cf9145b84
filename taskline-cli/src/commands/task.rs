//! Task commands - add, list, toggle, edit, remove
//!
//! Each command opens the signed-in user's task view, applies the current
//! snapshot and acts on it. Task ids may be abbreviated to any unique prefix.

use anyhow::{bail, Result};
use colored::Colorize;
use dialoguer::Confirm;
use serde::Serialize;
use taskline_core::services::{SessionState, TaskViewModel};
use taskline_core::{Task, TaskFilter, TaskPatch, TasklineContext};

use super::get_context;
use crate::output::{self, short_id};

/// Open the task view for the signed-in user with its first snapshot applied
fn open_view(ctx: &TasklineContext) -> Result<(SessionState, TaskViewModel)> {
    let session = ctx.session();
    let mut rx = session.watch();
    let mut vm = ctx.view_model();
    vm.sync_session(&mut rx);

    if vm.identity().is_none() {
        bail!("Not signed in. Use 'tk login' or 'tk register' first.");
    }
    vm.drain_pending();
    if let Some(e) = vm.error() {
        bail!("Failed to load tasks: {}", e);
    }
    Ok((session, vm))
}

/// Resolve a full task id from a unique prefix
fn resolve_id(vm: &TaskViewModel, prefix: &str) -> Result<String> {
    let matches: Vec<&Task> = vm
        .all_tasks()
        .iter()
        .filter(|t| t.id.starts_with(prefix))
        .collect();
    match matches.as_slice() {
        [task] => Ok(task.id.clone()),
        [] => bail!("No task matches id '{}'", prefix),
        _ => bail!("Task id '{}' is ambiguous ({} matches)", prefix, matches.len()),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskJson<'a> {
    id: &'a str,
    title: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'a str,
    completed: bool,
    created_at: String,
    updated_at: String,
}

impl<'a> From<&'a Task> for TaskJson<'a> {
    fn from(task: &'a Task) -> Self {
        Self {
            id: &task.id,
            title: &task.title,
            description: &task.description,
            completed: task.completed,
            created_at: task.created_at.to_rfc3339(),
            updated_at: task.updated_at.to_rfc3339(),
        }
    }
}

pub async fn add(title: &str, description: Option<&str>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let (_session, mut vm) = open_view(&ctx)?;
    let id = vm.add_task(title, description).await?;

    if json {
        println!("{}", serde_json::json!({ "id": id }));
    } else {
        output::success(&format!("Added task {}", short_id(&id)));
    }
    Ok(())
}

pub async fn list(filter: Option<TaskFilter>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let (_session, mut vm) = open_view(&ctx)?;
    if let Some(filter) = filter {
        vm.set_filter(filter);
    }

    if json {
        let tasks: Vec<TaskJson> = vm.tasks().iter().map(TaskJson::from).collect();
        return output::print_json(&tasks);
    }

    if vm.tasks().is_empty() {
        match vm.filter() {
            TaskFilter::All => output::hint("No tasks yet. Add one with 'tk add'."),
            other => output::hint(&format!("No {} tasks.", other)),
        }
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["ID", "", "Title", "Description", "Created"]);
    for task in vm.tasks() {
        let title = if task.completed {
            task.title.dimmed().to_string()
        } else {
            task.title.clone()
        };
        table.add_row(vec![
            short_id(&task.id).to_string(),
            output::status_mark(task.completed),
            title,
            task.description.clone(),
            task.created_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    println!("{}", table);

    let remaining = vm.all_tasks().iter().filter(|t| !t.completed).count();
    output::hint(&format!(
        "{} shown ({}), {} of {} remaining",
        vm.tasks().len(),
        vm.filter(),
        remaining,
        vm.all_tasks().len()
    ));
    Ok(())
}

pub async fn toggle(id: &str, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let (_session, mut vm) = open_view(&ctx)?;
    let id = resolve_id(&vm, id)?;
    vm.toggle(&id).await?;

    let completed = ctx
        .repository
        .get_task(&id)
        .await?
        .map(|t| t.completed)
        .unwrap_or_default();
    if json {
        println!("{}", serde_json::json!({ "id": id, "completed": completed }));
    } else if completed {
        output::success(&format!("Completed {}", short_id(&id)));
    } else {
        output::info(&format!("Reopened {}", short_id(&id)));
    }
    Ok(())
}

pub async fn edit(
    id: &str,
    title: Option<String>,
    description: Option<String>,
    clear_description: bool,
    json: bool,
) -> Result<()> {
    let mut patch = TaskPatch::new();
    if let Some(title) = title {
        patch = patch.title(title);
    }
    if clear_description {
        patch = patch.description(None);
    } else if let Some(description) = description {
        patch = patch.description(Some(description));
    }
    if patch.is_empty() {
        bail!("Nothing to change. Pass --title, --description or --clear-description.");
    }

    let ctx = get_context()?;
    let (_session, mut vm) = open_view(&ctx)?;
    let id = resolve_id(&vm, id)?;
    vm.update_task(&id, patch).await?;

    if json {
        println!("{}", serde_json::json!({ "id": id, "updated": true }));
    } else {
        output::success(&format!("Updated {}", short_id(&id)));
    }
    Ok(())
}

pub async fn remove(id: &str, force: bool, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let (_session, mut vm) = open_view(&ctx)?;
    let id = resolve_id(&vm, id)?;

    if !force && !json {
        let title = vm
            .all_tasks()
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.title.clone())
            .unwrap_or_default();
        if !Confirm::new()
            .with_prompt(format!("Delete '{}'?", title))
            .default(false)
            .interact()?
        {
            output::hint("Cancelled");
            return Ok(());
        }
    }

    vm.remove(&id).await?;
    if json {
        println!("{}", serde_json::json!({ "id": id, "deleted": true }));
    } else {
        output::success(&format!("Deleted {}", short_id(&id)));
    }
    Ok(())
}
