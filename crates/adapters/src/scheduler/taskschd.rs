// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Windows Task Scheduler adapter
//!
//! Each job is one native task filed under `\Cormorant\<namespace>\<name>`.
//! schtasks has no partial-update call, so update is always remove + add.
//! Enumeration skips the operating system's own `\Microsoft\` tree.
//!
//! Trigger derivation covers a conservative cron subset: numeric minute and
//! hour, `*` day-of-month and month, and either `*` (daily) or a comma list
//! of weekdays. Anything else is `UnsupportedSchedule`; coverage grows as
//! schedules demand it.

use super::{replaces, SchedulerAdapter, SchedulerError};
use async_trait::async_trait;
use cor_core::{identity, JobConfigStore, Marker, ScheduledEntry};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Top-level folder holding every Cormorant-managed task
pub const TASK_FOLDER: &str = "\\Cormorant\\";

/// Captured output of one schtasks invocation
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Runs the schtasks tool.
///
/// The real implementation shells out; tests substitute canned output.
#[async_trait]
pub trait TaskRunner: Clone + Send + Sync + 'static {
    async fn run(&self, args: &[&str], stdin: Option<&str>) -> Result<ToolOutput, SchedulerError>;
}

/// Shells out to the system `schtasks` tool
#[derive(Clone, Default)]
pub struct SchtasksRunner;

#[async_trait]
impl TaskRunner for SchtasksRunner {
    async fn run(&self, args: &[&str], stdin: Option<&str>) -> Result<ToolOutput, SchedulerError> {
        let mut cmd = Command::new("schtasks");
        cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());
        if stdin.is_some() {
            cmd.stdin(Stdio::piped());
        }

        let mut child = cmd.spawn()?;
        if let Some(input) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input.as_bytes()).await?;
            }
        }

        let output = child.wait_with_output().await?;
        Ok(ToolOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Task-Scheduler-style backend over a [`TaskRunner`]
#[derive(Clone)]
pub struct TaskSchedulerAdapter<R: TaskRunner = SchtasksRunner> {
    runner: R,
    configs: JobConfigStore,
}

/// One native task, read back from its XML definition
#[derive(Debug, Clone)]
struct NativeTask {
    path: String,
    schedule: String,
    command: String,
}

impl<R: TaskRunner> TaskSchedulerAdapter<R> {
    pub fn new(runner: R, configs: JobConfigStore) -> Self {
        Self { runner, configs }
    }

    pub fn configs(&self) -> &JobConfigStore {
        &self.configs
    }

    /// Task paths under our folder, empty when the folder does not exist yet.
    async fn managed_paths(&self) -> Result<Vec<String>, SchedulerError> {
        let out = self
            .runner
            .run(&["/Query", "/TN", TASK_FOLDER, "/FO", "LIST"], None)
            .await?;
        if out.status != 0 {
            // folder missing: nothing provisioned yet
            return Ok(Vec::new());
        }
        Ok(parse_task_names(&out.stdout)
            .into_iter()
            .filter(|p| p.len() > TASK_FOLDER.len() && p.starts_with(TASK_FOLDER))
            .collect())
    }

    /// Every task path outside the `\Microsoft\` tree.
    async fn all_paths(&self) -> Result<Vec<String>, SchedulerError> {
        let out = self.runner.run(&["/Query", "/FO", "LIST"], None).await?;
        if out.status != 0 {
            return Err(SchedulerError::Tool(out.stderr));
        }
        Ok(parse_task_names(&out.stdout)
            .into_iter()
            .filter(|p| !p.starts_with("\\Microsoft\\"))
            .collect())
    }

    async fn read_task(&self, path: &str) -> Option<NativeTask> {
        let out = self
            .runner
            .run(&["/Query", "/TN", path, "/XML"], None)
            .await
            .ok()?;
        if out.status != 0 {
            return None;
        }
        let (command, schedule) = parse_task_xml(&out.stdout)?;
        Some(NativeTask {
            path: path.to_string(),
            schedule,
            command,
        })
    }

    async fn load_tasks(&self, paths: Vec<String>) -> Vec<NativeTask> {
        let mut tasks = Vec::with_capacity(paths.len());
        for path in paths {
            // tasks that vanish or fail to parse between query and read are
            // skipped, same as the next enumeration would
            if let Some(task) = self.read_task(&path).await {
                tasks.push(task);
            }
        }
        tasks
    }

    fn entry_from_task(&self, task: &NativeTask, index: usize) -> ScheduledEntry {
        match Marker::parse(&task.command) {
            Some(Marker::Id(id)) => {
                let (name, namespace) = match self.configs.load(&id) {
                    Ok(Some(config)) => (config.name, config.namespace),
                    _ => (id.to_string(), "default".to_string()),
                };
                ScheduledEntry {
                    marker: Some(Marker::Id(id)),
                    name,
                    namespace,
                    schedule: task.schedule.clone(),
                    command: task.command.clone(),
                }
            }
            Some(Marker::Legacy { namespace, name }) => ScheduledEntry {
                marker: Some(Marker::Legacy {
                    namespace: namespace.clone(),
                    name: name.clone(),
                }),
                name,
                namespace,
                schedule: task.schedule.clone(),
                command: task.command.clone(),
            },
            None => {
                let (name, namespace) = match identity::recover(&task.command) {
                    Some((name, namespace)) => (
                        name,
                        namespace.unwrap_or_else(|| identity::DISCOVERED_NAMESPACE.to_string()),
                    ),
                    None => (
                        identity::synthesized_name(index),
                        identity::DISCOVERED_NAMESPACE.to_string(),
                    ),
                };
                ScheduledEntry {
                    marker: None,
                    name,
                    namespace,
                    schedule: task.schedule.clone(),
                    command: task.command.clone(),
                }
            }
        }
    }

    async fn delete_path(&self, path: &str) -> Result<(), SchedulerError> {
        let out = self
            .runner
            .run(&["/Delete", "/TN", path, "/F"], None)
            .await?;
        if out.status != 0 {
            return Err(SchedulerError::Tool(out.stderr));
        }
        Ok(())
    }

    /// Locate the native task whose entry satisfies `pred`.
    async fn find_managed<F>(&self, pred: F) -> Result<Option<NativeTask>, SchedulerError>
    where
        F: Fn(&ScheduledEntry) -> bool,
    {
        let tasks = self.load_tasks(self.managed_paths().await?).await;
        for (index, task) in tasks.iter().enumerate() {
            if pred(&self.entry_from_task(task, index)) {
                return Ok(Some(task.clone()));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl<R: TaskRunner> SchedulerAdapter for TaskSchedulerAdapter<R> {
    async fn add(&self, entry: &ScheduledEntry) -> Result<(), SchedulerError> {
        if let Some(Marker::Id(id)) = &entry.marker {
            let collision = self
                .find_managed(|existing| existing.marker == Some(Marker::Id(*id)))
                .await?;
            if collision.is_some() {
                return Err(SchedulerError::AlreadyExists(Marker::Id(*id)));
            }
        }

        let trigger = cron_to_trigger(&entry.schedule)?;
        let xml = task_xml(&entry.command, &trigger);
        let path = task_path(&entry.namespace, &entry.name);

        let out = self
            .runner
            .run(&["/Create", "/TN", &path, "/XML", "-"], Some(&xml))
            .await?;
        if out.status != 0 {
            return Err(SchedulerError::Tool(out.stderr));
        }
        Ok(())
    }

    async fn update(&self, entry: &ScheduledEntry) -> Result<(), SchedulerError> {
        // no partial-update call in the native tool: remove, then recreate
        let existing = self
            .find_managed(|candidate| replaces(candidate, entry))
            .await?
            .ok_or_else(|| SchedulerError::NotFound(target_marker(entry)))?;
        self.delete_path(&existing.path).await?;
        self.add(entry).await
    }

    async fn remove(&self, selector: &Marker) -> Result<(), SchedulerError> {
        let existing = self
            .find_managed(|candidate| candidate.marker.as_ref() == Some(selector))
            .await?
            .ok_or_else(|| SchedulerError::NotFound(selector.clone()))?;
        self.delete_path(&existing.path).await
    }

    async fn remove_unmanaged(&self, command: &str) -> Result<(), SchedulerError> {
        let tasks = self.load_tasks(self.all_paths().await?).await;
        for task in tasks {
            if Marker::parse(&task.command).is_none() && task.command == command {
                self.delete_path(&task.path).await?;
            }
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ScheduledEntry>, SchedulerError> {
        let tasks = self.load_tasks(self.managed_paths().await?).await;
        Ok(tasks
            .iter()
            .enumerate()
            .map(|(index, task)| self.entry_from_task(task, index))
            .filter(ScheduledEntry::is_managed)
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<ScheduledEntry>, SchedulerError> {
        let tasks = self.load_tasks(self.all_paths().await?).await;
        Ok(tasks
            .iter()
            .enumerate()
            .map(|(index, task)| self.entry_from_task(task, index))
            .collect())
    }

    async fn verify(&self, selector: &Marker) -> Result<bool, SchedulerError> {
        Ok(self
            .find_managed(|candidate| candidate.marker.as_ref() == Some(selector))
            .await?
            .is_some())
    }
}

fn task_path(namespace: &str, name: &str) -> String {
    let namespace = if namespace.is_empty() {
        "default"
    } else {
        namespace
    };
    format!("{}{}\\{}", TASK_FOLDER, namespace, name)
}

fn target_marker(entry: &ScheduledEntry) -> Marker {
    entry.marker.clone().unwrap_or(Marker::Legacy {
        namespace: entry.namespace.clone(),
        name: entry.name.clone(),
    })
}

/// `TaskName:` values out of `schtasks /Query /FO LIST` output
fn parse_task_names(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("TaskName:"))
        .map(|path| path.trim().to_string())
        .filter(|path| !path.is_empty())
        .collect()
}

/// Trigger derived from the supported cron subset. Weekday order is kept as
/// written so the schedule text round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CronTrigger {
    minute: u32,
    hour: u32,
    days: Option<Vec<u8>>,
}

fn cron_to_trigger(schedule: &str) -> Result<CronTrigger, SchedulerError> {
    let unsupported = || SchedulerError::UnsupportedSchedule(schedule.to_string());

    let fields: Vec<&str> = schedule.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(unsupported());
    }
    let minute: u32 = fields[0].parse().ok().filter(|m| *m < 60).ok_or_else(unsupported)?;
    let hour: u32 = fields[1].parse().ok().filter(|h| *h < 24).ok_or_else(unsupported)?;
    if fields[2] != "*" || fields[3] != "*" {
        return Err(unsupported());
    }
    let days = match fields[4] {
        "*" => None,
        spec => {
            let days: Option<Vec<u8>> = spec
                .split(',')
                .map(|d| d.parse::<u8>().ok().filter(|d| *d <= 6))
                .collect();
            Some(days.ok_or_else(unsupported)?)
        }
    };
    Ok(CronTrigger { minute, hour, days })
}

const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

fn trigger_xml(trigger: &CronTrigger) -> String {
    let start = format!("2024-01-01T{:02}:{:02}:00", trigger.hour, trigger.minute);
    match &trigger.days {
        None => format!(
            "<CalendarTrigger><StartBoundary>{}</StartBoundary><Enabled>true</Enabled><ScheduleByDay><DaysInterval>1</DaysInterval></ScheduleByDay></CalendarTrigger>",
            start
        ),
        Some(days) => {
            let day_elements: String = days
                .iter()
                .map(|d| format!("<{}/>", WEEKDAYS[*d as usize]))
                .collect();
            format!(
                "<CalendarTrigger><StartBoundary>{}</StartBoundary><Enabled>true</Enabled><ScheduleByWeek><WeeksInterval>1</WeeksInterval><DaysOfWeek>{}</DaysOfWeek></ScheduleByWeek></CalendarTrigger>",
                start, day_elements
            )
        }
    }
}

/// Render the full task definition XML
fn task_xml(command: &str, trigger: &CronTrigger) -> String {
    // first whitespace splits executable from arguments; the wrapped helper
    // invocation never embeds spaces in the executable path
    let (executable, arguments) = match command.split_once(char::is_whitespace) {
        Some((exe, args)) => (exe, args.trim()),
        None => (command, ""),
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Task version="1.2" xmlns="http://schemas.microsoft.com/windows/2004/02/mit/task">
  <RegistrationInfo>
    <Description>Cormorant managed task</Description>
  </RegistrationInfo>
  <Triggers>
    {}
  </Triggers>
  <Principals>
    <Principal>
      <LogonType>InteractiveToken</LogonType>
      <RunLevel>LeastPrivilege</RunLevel>
    </Principal>
  </Principals>
  <Settings>
    <MultipleInstancesPolicy>IgnoreNew</MultipleInstancesPolicy>
    <DisallowStartIfOnBatteries>false</DisallowStartIfOnBatteries>
    <StopIfGoingOnBatteries>false</StopIfGoingOnBatteries>
    <AllowHardTerminate>true</AllowHardTerminate>
    <StartWhenAvailable>true</StartWhenAvailable>
    <RunOnlyIfNetworkAvailable>false</RunOnlyIfNetworkAvailable>
    <AllowStartOnDemand>true</AllowStartOnDemand>
    <Enabled>true</Enabled>
    <Hidden>false</Hidden>
  </Settings>
  <Actions Context="Author">
    <Exec>
      <Command>{}</Command>
      <Arguments>{}</Arguments>
    </Exec>
  </Actions>
</Task>"#,
        trigger_xml(trigger),
        quick_xml::escape::escape(executable),
        quick_xml::escape::escape(arguments),
    )
}

/// Pull the command line and a reconstructed cron schedule out of a task
/// definition. Foreign trigger shapes fall back to a daily-midnight
/// placeholder schedule.
fn parse_task_xml(xml: &str) -> Option<(String, String)> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<String> = Vec::new();
    let mut command = String::new();
    let mut arguments = String::new();
    let mut start_boundary = String::new();
    let mut by_day = false;
    let mut by_week = false;
    let mut days: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                note_element(&stack, &name, &mut by_day, &mut by_week, &mut days);
                stack.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                note_element(&stack, &name, &mut by_day, &mut by_week, &mut days);
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().ok()?.trim().to_string();
                match stack.last().map(String::as_str) {
                    Some("Command") => command = text,
                    Some("Arguments") => arguments = text,
                    Some("StartBoundary") => start_boundary = text,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
    }

    if command.is_empty() {
        return None;
    }
    let full_command = if arguments.is_empty() {
        command
    } else {
        format!("{} {}", command, arguments)
    };

    let schedule = reconstruct_schedule(&start_boundary, by_day, by_week, &days);
    Some((full_command, schedule))
}

fn note_element(
    stack: &[String],
    name: &str,
    by_day: &mut bool,
    by_week: &mut bool,
    days: &mut Vec<String>,
) {
    if stack.last().is_some_and(|parent| parent == "DaysOfWeek") {
        days.push(name.to_string());
        return;
    }
    match name {
        "ScheduleByDay" => *by_day = true,
        "ScheduleByWeek" => *by_week = true,
        _ => {}
    }
}

fn reconstruct_schedule(start_boundary: &str, by_day: bool, by_week: bool, days: &[String]) -> String {
    let time = start_boundary.split('T').nth(1).unwrap_or("");
    let mut parts = time.split(':');
    let hour: u32 = parts.next().and_then(|h| h.parse().ok()).unwrap_or(0);
    let minute: u32 = parts.next().and_then(|m| m.parse().ok()).unwrap_or(0);

    if by_week && !days.is_empty() {
        let dow: Vec<String> = days
            .iter()
            .filter_map(|d| WEEKDAYS.iter().position(|w| w == d))
            .map(|n| n.to_string())
            .collect();
        if !dow.is_empty() {
            return format!("{} {} * * {}", minute, hour, dow.join(","));
        }
    }
    if by_day || by_week {
        return format!("{} {} * * *", minute, hour);
    }
    // not a shape we wrote; placeholder keeps the field non-empty
    "0 0 * * *".to_string()
}

#[cfg(test)]
#[path = "taskschd_tests.rs"]
mod tests;
