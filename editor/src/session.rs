//! A headless editing session: one image, its modules and its history,
//! driven by script commands.

use std::io::Write;

use darkroom_core::gradient_slider::{GradientSlider, StepMultipliers};
use darkroom_core::{
    Develop, HistoryController, HistoryError, HistoryItem, HistoryListener, HistoryResult, ImageId,
    ModuleFlags, ModuleId, ModuleInstance, ModuleRegistry, NoUi, PipelineContext, PipelineEvent,
    PipelineHost, PopReport,
};

use crate::config::Config;
use crate::script::{Command, ScriptError};

/// Image edited by a scripted session.
pub const SESSION_IMAGE: ImageId = ImageId(1);

/// The module set of a fresh session, in pipeline order.
pub fn default_modules() -> ModuleRegistry {
    let mut iop = ModuleRegistry::new();
    let modules = [
        (
            "rawprepare",
            "raw black/white point",
            1.0,
            ModuleFlags::HIDDEN | ModuleFlags::DEFAULT_ENABLED | ModuleFlags::ONE_INSTANCE,
        ),
        ("mask_manager", "mask manager", 2.0, ModuleFlags::HIDDEN | ModuleFlags::ONE_INSTANCE),
        (
            "exposure",
            "exposure",
            10.0,
            ModuleFlags::DEFAULT_ENABLED,
        ),
        ("colorbalancergb", "color balance rgb", 20.0, ModuleFlags::empty()),
        ("colorzones", "color zones", 30.0, ModuleFlags::empty()),
        ("sharpen", "sharpen", 40.0, ModuleFlags::empty()),
        ("vignette", "vignetting", 50.0, ModuleFlags::DEPRECATED),
        (
            "gamma",
            "display encoding",
            100.0,
            ModuleFlags::HIDDEN
                | ModuleFlags::DEFAULT_ENABLED
                | ModuleFlags::ONE_INSTANCE
                | ModuleFlags::HIDE_ENABLE_BUTTON,
        ),
    ];
    for (op, name, order, flags) in modules {
        iop.insert(
            ModuleInstance::new(op, name, order)
                .with_flags(flags)
                .with_default_params(vec![0]),
        );
    }
    iop
}

/// Logs every history event.
struct EventLogger;

impl HistoryListener for EventLogger {
    fn on_event(&mut self, event: &PipelineEvent, items: &[HistoryItem]) {
        match event {
            PipelineEvent::WillChange(snapshot) => {
                log::debug!("history will change from {} items", snapshot.len());
            }
            PipelineEvent::Changed => log::debug!("history changed, {} rows", items.len()),
            PipelineEvent::ModuleRemoved(id) => log::debug!("module {id} removed"),
        }
    }
}

pub struct Session {
    history: HistoryController,
    multipliers: StepMultipliers,
}

impl Session {
    /// Opens a session on [`SESSION_IMAGE`], starting from the history the
    /// host has stored for it.
    pub fn open(config: &Config, mut host: impl PipelineHost) -> HistoryResult<Self> {
        let mut develop = Develop::with_modules(default_modules()).with_image(SESSION_IMAGE);
        host.reload_history_items(&mut develop)?;
        develop.resync_modules_order();
        log::info!(
            "session on image {SESSION_IMAGE}: {} history items, cursor {}",
            develop.history().len(),
            develop.history_end()
        );

        let context = PipelineContext::new(develop, host, NoUi);
        let mut history = HistoryController::new(context, config.history.max_undo);
        history.add_listener(Box::new(EventLogger));
        Ok(Self {
            history,
            multipliers: config.slider.multipliers(),
        })
    }

    pub fn history(&self) -> &HistoryController {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryController {
        &mut self.history
    }

    /// A gradient slider using the configured step multipliers.
    pub fn slider(&self, markers: usize) -> GradientSlider {
        GradientSlider::new(markers).with_step_multipliers(self.multipliers)
    }

    /// Runs a script, stopping at the first failing command.
    pub fn run(&mut self, commands: &[Command], out: &mut impl Write) -> Result<(), ScriptError> {
        for (index, command) in commands.iter().enumerate() {
            log::debug!("running command {index}: {command}");
            self.execute(command, out).map_err(|e| match e {
                ScriptError::Command { source, .. } => ScriptError::Command { index, source },
                other => other,
            })?;
        }
        Ok(())
    }

    fn execute(&mut self, command: &Command, out: &mut impl Write) -> Result<(), ScriptError> {
        let failed = |source| ScriptError::Command { index: 0, source };
        match command {
            Command::Edit {
                op,
                instance,
                params,
                enabled,
            } => {
                let id = self.instance(op, *instance)?;
                self.history
                    .edit_module(id, params.clone(), *enabled)
                    .map_err(failed)?;
            }
            Command::Duplicate { op, instance } => {
                let id = self.instance(op, *instance)?;
                let copy = self.history.duplicate_module(id).map_err(failed)?;
                log::info!("duplicated {op} ({instance}) as {copy}");
            }
            Command::Delete { op, instance } => {
                let id = self.instance(op, *instance)?;
                self.history.delete_module(id).map_err(failed)?;
            }
            Command::Undo => match self.history.undo() {
                Ok(report) => log_report(&report),
                Err(HistoryError::NothingToUndo) => log::info!("nothing to undo"),
                Err(e) => return Err(failed(e)),
            },
            Command::Redo => match self.history.redo() {
                Ok(report) => log_report(&report),
                Err(HistoryError::NothingToRedo) => log::info!("nothing to redo"),
                Err(e) => return Err(failed(e)),
            },
            Command::Jump(num) => self.history.pop_history_items(*num).map_err(failed)?,
            Command::Compress => {
                let end = self.history.compress_history().map_err(failed)?;
                log::info!("history compressed, cursor {end}");
            }
            Command::Print => self.print(out)?,
        }
        Ok(())
    }

    fn instance(&self, op: &str, instance: i32) -> Result<ModuleId, ScriptError> {
        self.history
            .develop()
            .iop
            .find_instance(op, instance)
            .ok_or_else(|| ScriptError::UnknownInstance {
                op: op.to_string(),
                instance,
            })
    }

    /// Writes the history list, newest row last, marking the current one.
    pub fn print(&self, out: &mut impl Write) -> std::io::Result<()> {
        let items = self.history.history_items();
        let undo = self.history.undo_stack();
        writeln!(
            out,
            "history: {} items, undo {}, redo {}",
            items.len() - 1,
            undo.undo_count(),
            undo.redo_count()
        )?;
        for item in &items {
            let marker = if item.selected { '*' } else { ' ' };
            let state = if item.enabled { "" } else { " (off)" };
            let deprecated = if item.deprecated { " [deprecated]" } else { "" };
            writeln!(out, "{marker} {:>3}  {}{state}{deprecated}", item.cursor, item.label)?;
        }
        Ok(())
    }
}

fn log_report(report: &PopReport) {
    log::info!(
        "{} restored cursor {} ({} created, {} retired)",
        report.action,
        report.history_end,
        report.created.len(),
        report.retired.len()
    );
    for failure in &report.failures {
        log::warn!("{} left an entry unresolved: {failure}", report.action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse;
    use darkroom_core::MemoryHost;
    use darkroom_core::gradient_slider::StepModifier;

    fn run(session: &mut Session, script: &str) -> String {
        let mut out = Vec::new();
        session.run(&parse(script).unwrap(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn default_modules_are_in_pipeline_order() {
        let iop = default_modules();
        let ops: Vec<_> = iop.iter().map(|(_, m)| m.op.as_str()).collect();
        assert_eq!(ops.first(), Some(&"rawprepare"));
        assert_eq!(ops.last(), Some(&"gamma"));
        assert_eq!(iop.len(), 8);
    }

    #[test]
    fn scripted_edits_show_in_the_history_list() {
        let mut session = Session::open(&Config::default(), MemoryHost::new()).unwrap();
        let out = run(
            &mut session,
            r#"[
                Edit(op: "exposure", params: [2]),
                Duplicate(op: "colorzones"),
                Edit(op: "colorzones", instance: 1, params: [5], enabled: false),
                Edit(op: "vignette", params: [1]),
                Print,
            ]"#,
        );
        let expected = "\
history: 3 items, undo 4, redo 0
    0  original
    1  exposure
    2  color zones 1 (off)
*   3  vignetting [deprecated]
";
        assert_eq!(out, expected);
    }

    #[test]
    fn undo_of_delete_in_a_script() {
        let mut session = Session::open(&Config::default(), MemoryHost::new()).unwrap();
        let out = run(
            &mut session,
            r#"[
                Duplicate(op: "sharpen"),
                Edit(op: "sharpen", instance: 1, params: [8]),
                Delete(op: "sharpen", instance: 1),
                Undo,
                Print,
            ]"#,
        );
        assert!(out.contains("*   1  sharpen 1"));
        let dev = session.history().develop();
        let revived = dev.iop.find_instance("sharpen", 1).unwrap();
        assert_eq!(dev.iop.get(revived).unwrap().params, vec![8]);
    }

    #[test]
    fn empty_undo_is_not_an_error() {
        let mut session = Session::open(&Config::default(), MemoryHost::new()).unwrap();
        let out = run(&mut session, "[Undo, Redo, Print]");
        assert!(out.starts_with("history: 0 items"));
        assert!(out.contains("*   0  original"));
    }

    #[test]
    fn failing_command_reports_its_index() {
        let mut session = Session::open(&Config::default(), MemoryHost::new()).unwrap();
        let commands = parse(r#"[Edit(op: "exposure"), Duplicate(op: "gamma")]"#).unwrap();
        let err = session.run(&commands, &mut Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            ScriptError::Command {
                index: 1,
                source: HistoryError::SingleInstance(_)
            }
        ));

        let commands = parse(r#"[Delete(op: "sharpen", instance: 4)]"#).unwrap();
        let err = session.run(&commands, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, ScriptError::UnknownInstance { instance: 4, .. }));
    }

    #[test]
    fn history_carries_over_between_sessions() {
        let host = MemoryHost::new();
        let mut first = Session::open(&Config::default(), host.clone()).unwrap();
        run(
            &mut first,
            r#"[
                Edit(op: "exposure", params: [1]),
                Edit(op: "sharpen", params: [2]),
                Edit(op: "exposure", params: [3]),
                Compress,
            ]"#,
        );
        assert_eq!(host.history_end(Some(SESSION_IMAGE)), 2);

        let second = Session::open(&Config::default(), host).unwrap();
        let dev = second.history().develop();
        assert_eq!(dev.history().len(), 2);
        let exposure = dev.iop.find("exposure").unwrap();
        assert_eq!(dev.iop.get(exposure).unwrap().params, vec![3]);
        assert_eq!(second.history().undo_stack().undo_count(), 0);
    }

    #[test]
    fn slider_uses_configured_multipliers() {
        let mut config = Config::default();
        config.slider.rough_step_multiplier = 5.0;
        let session = Session::open(&config, MemoryHost::new()).unwrap();
        let mut slider = session.slider(1);
        slider.set_value(0, 0.5);
        assert!(slider.step(true, StepModifier::Rough));
        assert!((slider.positions()[0] - 0.55).abs() < 1e-9);
    }
}
