use crate::widgets::{
    ActionMenu, ConfirmDialog, DetailsPane, Footer, HelpOverlay, MessageDialog, ProgressDialog,
    TreePane,
};
use crate::{ColorLevel, Theme, ThemeMode, ThemeSettings};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Layout, Rect},
    style::Style,
    widgets::Block,
};
use std::io::{self, Stdout};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use vboxcli_core::details;
use vboxcli_core::{Action, MachineId, MachineTree, menu_for, menu_title, pause_toggle};
use vboxcli_vbox::{ActionOutcome, ActionTask, Facade, Hypervisor, TaskPoll, VboxError};

const TICK: Duration = Duration::from_millis(100);
/// Rows taken by the footer and the tree pane borders.
const CHROME_ROWS: u16 = 5;

#[derive(Error, Debug)]
pub enum UiError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("VirtualBox error: {0}")]
    Vbox(#[from] VboxError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Overlay {
    None,
    Help,
    Message { title: String, text: String },
    Confirm(Action),
    Menu {
        title: &'static str,
        actions: &'static [Action],
        selected: usize,
    },
}

pub struct App<H: Hypervisor> {
    facade: Facade<H>,
    tree: MachineTree,
    task: Option<ActionTask<H>>,
    overlay: Overlay,
    theme: Theme,
    theme_mode: ThemeMode,
    color_level: ColorLevel,
    page: usize,
    details_scroll: u16,
    details_max_scroll: u16,
    should_quit: bool,
}

impl<H: Hypervisor> App<H> {
    /// Load the initial tree.
    ///
    /// # Errors
    /// Returns `UiError::Vbox` if the machine list cannot be read.
    pub async fn new(mut facade: Facade<H>) -> Result<Self, UiError> {
        let inventory = facade.inventory().await?;
        info!(
            "Loaded {} machines in {} groups",
            inventory.machines.len(),
            inventory.groups.len()
        );
        let settings = ThemeSettings::from_env();

        Ok(Self {
            facade,
            tree: MachineTree::new(inventory),
            task: None,
            overlay: Overlay::None,
            theme: Theme::for_mode(settings.mode, settings.color_level),
            theme_mode: settings.mode,
            color_level: settings.color_level,
            page: 10,
            details_scroll: 0,
            details_max_scroll: 0,
            should_quit: false,
        })
    }

    /// Run the TUI event loop until the user quits.
    ///
    /// # Errors
    /// Returns `UiError::Io` when terminal I/O fails.
    pub async fn run(&mut self) -> Result<(), UiError> {
        let mut terminal = setup_terminal()?;
        self.apply_theme(ThemeSettings::resolve());

        let result = self.event_loop(&mut terminal).await;
        if let Some(mut task) = self.task.take() {
            task.abort().await;
        }
        restore_terminal(&mut terminal)?;
        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ) -> Result<(), UiError> {
        loop {
            let height = terminal.size()?.height;
            self.page = usize::from(height.saturating_sub(CHROME_ROWS)).max(1);
            terminal.draw(|f| self.draw(f))?;

            let wait = if self.task.is_some() {
                self.poll_task(TICK).await;
                Duration::ZERO
            } else {
                TICK
            };

            if event::poll(wait)?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                self.handle_key(key).await;
            }

            if self.should_quit {
                return Ok(());
            }
        }
    }

    async fn poll_task(&mut self, wait: Duration) {
        let Some(task) = self.task.as_mut() else {
            return;
        };
        if let TaskPoll::Finished(_) = task.poll(self.facade.hypervisor(), wait).await
            && let Some(task) = self.task.take()
        {
            self.finish_task(task).await;
        }
    }

    async fn handle_key(&mut self, key: KeyEvent) {
        let is_ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if self.task.is_some() {
            if key.code == KeyCode::Esc || (is_ctrl && key.code == KeyCode::Char('c')) {
                self.abort_task().await;
            }
            return;
        }

        match self.overlay.clone() {
            Overlay::None => self.handle_main_key(key, is_ctrl).await,
            Overlay::Help => {
                if matches!(key.code, KeyCode::Char('?' | 'q') | KeyCode::Esc | KeyCode::Enter) {
                    self.overlay = Overlay::None;
                }
            }
            Overlay::Message { .. } => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char(' ')) {
                    self.overlay = Overlay::None;
                }
            }
            Overlay::Confirm(action) => match key.code {
                KeyCode::Char('y' | 'Y') | KeyCode::Enter => {
                    self.overlay = Overlay::None;
                    self.start_action(action).await;
                }
                KeyCode::Char('n' | 'N') | KeyCode::Esc => self.overlay = Overlay::None,
                _ => {}
            },
            Overlay::Menu {
                title,
                actions,
                selected,
            } => self.handle_menu_key(key, title, actions, selected).await,
        }
    }

    async fn handle_menu_key(
        &mut self,
        key: KeyEvent,
        title: &'static str,
        actions: &'static [Action],
        selected: usize,
    ) {
        let last = actions.len().saturating_sub(1);
        let chosen = match key.code {
            KeyCode::Esc => {
                self.overlay = Overlay::None;
                return;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.overlay = Overlay::Menu {
                    title,
                    actions,
                    selected: selected.saturating_sub(1),
                };
                return;
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.overlay = Overlay::Menu {
                    title,
                    actions,
                    selected: (selected + 1).min(last),
                };
                return;
            }
            KeyCode::Enter => actions.get(selected).copied(),
            KeyCode::Char(c) => actions
                .iter()
                .copied()
                .find(|a| a.shortcut().eq_ignore_ascii_case(&c)),
            _ => None,
        };

        if let Some(action) = chosen {
            self.overlay = Overlay::None;
            self.request_action(action).await;
        }
    }

    async fn handle_main_key(&mut self, key: KeyEvent, is_ctrl: bool) {
        if self.handle_overlay_toggles(key) {
            return;
        }
        if Self::should_quit(key, is_ctrl) {
            self.should_quit = true;
            return;
        }

        let before = self.tree.selection_identity();
        self.handle_tree_key(key, is_ctrl).await;
        if self.tree.selection_identity() != before {
            self.details_scroll = 0;
        }
    }

    async fn handle_tree_key(&mut self, key: KeyEvent, is_ctrl: bool) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.tree.move_up(),
            KeyCode::Down | KeyCode::Char('j') => self.tree.move_down(),
            KeyCode::PageUp => self.tree.page_up(self.page),
            KeyCode::PageDown => self.tree.page_down(self.page),
            KeyCode::Char('b') if is_ctrl => self.tree.page_up(self.page),
            KeyCode::Char('f') if is_ctrl => self.tree.page_down(self.page),
            KeyCode::Char('J') => self.scroll_details(1),
            KeyCode::Char('K') => self.scroll_details(-1),
            KeyCode::Char('d') if is_ctrl => self.scroll_details(self.half_page()),
            KeyCode::Char('u') if is_ctrl => self.scroll_details(-self.half_page()),
            KeyCode::Home | KeyCode::Char('g') => self.tree.home(),
            KeyCode::End | KeyCode::Char('G') => self.tree.end(),
            KeyCode::Left | KeyCode::Char('h') => self.tree.collapse(),
            KeyCode::Right | KeyCode::Char('l') => self.tree.expand(),
            KeyCode::Enter | KeyCode::Char(' ') => self.tree.toggle(),
            KeyCode::Char('r') => {
                if let Some(id) = self.selected_id() {
                    self.refresh_machine(&id).await;
                }
            }
            KeyCode::Char('R') => self.reload().await,
            KeyCode::Char('s') => self.open_menu(),
            KeyCode::Char('p') => {
                if let Some(action) = self
                    .tree
                    .selected_machine()
                    .and_then(|m| pause_toggle(&m.state))
                {
                    self.request_action(action).await;
                }
            }
            _ => {}
        }
    }

    fn handle_overlay_toggles(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('?') => {
                self.overlay = Overlay::Help;
                true
            }
            KeyCode::Char('t') => {
                self.theme_mode = self.theme_mode.toggle();
                self.theme = Theme::for_mode(self.theme_mode, self.color_level);
                true
            }
            _ => false,
        }
    }

    fn should_quit(key: KeyEvent, is_ctrl: bool) -> bool {
        (is_ctrl && matches!(key.code, KeyCode::Char('c' | 'q')))
            || matches!(key.code, KeyCode::Char('q' | 'Q'))
    }

    fn half_page(&self) -> i32 {
        i32::try_from(self.page / 2).unwrap_or(i32::MAX).max(1)
    }

    fn scroll_details(&mut self, delta: i32) {
        let next = i32::from(self.details_scroll).saturating_add(delta);
        let max = i32::from(self.details_max_scroll);
        self.details_scroll = u16::try_from(next.clamp(0, max)).unwrap_or_default();
    }

    fn selected_id(&self) -> Option<MachineId> {
        self.tree.selected_machine().map(|m| m.id.clone())
    }

    fn open_menu(&mut self) {
        let Some(machine) = self.tree.selected_machine() else {
            return;
        };
        if !machine.accessible {
            return;
        }
        let actions = menu_for(&machine.state);
        if actions.is_empty() {
            self.overlay = Overlay::Message {
                title: machine.name.clone(),
                text: format!(
                    "No start or stop actions while the machine is {}.",
                    machine.state.label()
                ),
            };
            return;
        }
        self.overlay = Overlay::Menu {
            title: menu_title(&machine.state),
            actions,
            selected: 0,
        };
    }

    async fn request_action(&mut self, action: Action) {
        if action.needs_confirmation() {
            self.overlay = Overlay::Confirm(action);
        } else {
            self.start_action(action).await;
        }
    }

    async fn start_action(&mut self, action: Action) {
        let Some(id) = self.selected_id() else {
            return;
        };
        let session = self.facade.start_session();
        let task = ActionTask::start(self.facade.hypervisor(), session, &id, action).await;
        if task.is_finished() {
            self.finish_task(task).await;
        } else {
            self.task = Some(task);
        }
    }

    async fn abort_task(&mut self) {
        if let Some(mut task) = self.task.take() {
            task.abort().await;
            self.finish_task(task).await;
        }
    }

    async fn finish_task(&mut self, task: ActionTask<H>) {
        self.refresh_machine(task.machine()).await;
        if let Some(message) = task.outcome().and_then(ActionOutcome::message) {
            self.overlay = Overlay::Message {
                title: task.action().label().to_string(),
                text: message.to_string(),
            };
        }
    }

    async fn refresh_machine(&mut self, id: &MachineId) {
        debug!("Refreshing machine {id}");
        let result = self.facade.refresh_machine(id).await;
        match result {
            Ok(machine) => {
                if let Err(e) = self.tree.update_machine(machine) {
                    warn!("Refreshed machine is not in the tree: {e}");
                }
            }
            Err(e) => {
                warn!("Failed to refresh machine {id}: {e}");
                self.overlay = Overlay::Message {
                    title: "Refresh".to_string(),
                    text: e.to_string(),
                };
            }
        }
    }

    async fn reload(&mut self) {
        self.facade.invalidate();
        match self.facade.inventory().await {
            Ok(inventory) => self.tree.rebuild(inventory),
            Err(e) => {
                warn!("Failed to reload machines: {e}");
                self.overlay = Overlay::Message {
                    title: "Reload".to_string(),
                    text: e.to_string(),
                };
            }
        }
    }

    fn draw(&mut self, f: &mut Frame) {
        let area = f.area();
        f.render_widget(
            Block::default().style(Style::default().fg(self.theme.fg).bg(self.theme.bg)),
            area,
        );

        let [body, footer] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(2)]).areas(area);
        let [left, right] =
            Layout::horizontal([Constraint::Ratio(1, 3), Constraint::Ratio(2, 3)]).areas(body);

        f.render_widget(
            TreePane {
                tree: &self.tree,
                theme: &self.theme,
            },
            left,
        );
        let sections = details::render(self.tree.selected_machine(), self.tree.host());
        let pane = DetailsPane {
            sections: &sections,
            theme: &self.theme,
            scroll: self.details_scroll,
        };
        let max_scroll = pane.max_scroll(right);
        f.render_widget(pane, right);
        self.details_max_scroll = max_scroll;
        self.details_scroll = self.details_scroll.min(max_scroll);
        f.render_widget(
            Footer {
                theme: &self.theme,
                busy: self.task.is_some(),
            },
            footer,
        );

        self.draw_overlays(f, area);
    }

    fn draw_overlays(&self, f: &mut Frame, area: Rect) {
        if let Some(task) = &self.task {
            let machine = self
                .tree
                .inventory()
                .machine(task.machine())
                .map_or(task.machine().as_str(), |m| m.name.as_str());
            f.render_widget(
                ProgressDialog {
                    caption: task.action().progress_caption(),
                    machine,
                    percent: task.percent(),
                    theme: &self.theme,
                },
                area,
            );
            return;
        }

        match &self.overlay {
            Overlay::None => {}
            Overlay::Help => f.render_widget(HelpOverlay { theme: &self.theme }, area),
            Overlay::Message { title, text } => f.render_widget(
                MessageDialog {
                    title,
                    message: text,
                    theme: &self.theme,
                },
                area,
            ),
            Overlay::Confirm(action) => f.render_widget(
                ConfirmDialog {
                    title: action.label(),
                    message: "Power off the selected machine?\nUnsaved guest data will be lost.",
                    theme: &self.theme,
                },
                area,
            ),
            Overlay::Menu {
                title,
                actions,
                selected,
            } => f.render_widget(
                ActionMenu {
                    title,
                    actions,
                    selected: *selected,
                    theme: &self.theme,
                },
                area,
            ),
        }
    }

    fn apply_theme(&mut self, settings: ThemeSettings) {
        self.theme_mode = settings.mode;
        self.color_level = settings.color_level;
        self.theme = Theme::for_mode(settings.mode, settings.color_level);
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, io::Error> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    Terminal::new(CrosstermBackend::new(stdout))
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<(), io::Error> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use vboxcli_core::enums::MachineState;
    use vboxcli_core::machine::SharedFolder;
    use vboxcli_core::{NodeKey, Selection};
    use vboxcli_vbox::testing::{FakeHypervisor, ProgressScript, machine};

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn fake() -> FakeHypervisor {
        FakeHypervisor::new(vec![
            machine("vm-off", "builder", MachineState::PoweredOff, &["/"]),
            machine("vm-on", "web", MachineState::Running, &["/"]),
        ])
    }

    async fn app(fake: &FakeHypervisor) -> App<FakeHypervisor> {
        let facade = Facade::connect(fake.clone()).await.unwrap();
        App::new(facade).await.unwrap()
    }

    fn screen(app: &mut App<FakeHypervisor>) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| app.draw(f)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn selected_name(app: &App<FakeHypervisor>) -> Option<String> {
        app.tree.selected_machine().map(|m| m.name.clone())
    }

    #[tokio::test]
    async fn test_renders_tree_and_details() {
        let fake = fake();
        let mut app = app(&fake).await;
        let text = screen(&mut app);
        assert!(text.contains("Virtual Machines"));
        assert!(text.contains("builder"));
        assert!(text.contains("No machine selected"));

        app.handle_key(press(KeyCode::Char('j'))).await;
        assert_eq!(selected_name(&app).as_deref(), Some("builder"));
        let text = screen(&mut app);
        assert!(text.contains("General"));
        assert!(text.contains("Powered Off"));
    }

    #[tokio::test]
    async fn test_navigation_keys() {
        let fake = fake();
        let mut app = app(&fake).await;
        app.handle_key(press(KeyCode::End)).await;
        assert_eq!(selected_name(&app).as_deref(), Some("web"));
        app.handle_key(press(KeyCode::Char('g'))).await;
        assert_eq!(app.tree.cursor(), 0);

        app.handle_key(press(KeyCode::Left)).await;
        assert_eq!(app.tree.rows().len(), 1);
        app.handle_key(press(KeyCode::Char('l'))).await;
        assert_eq!(app.tree.rows().len(), 3);
        app.handle_key(press(KeyCode::Enter)).await;
        assert_eq!(app.tree.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_start_from_menu() {
        let fake = fake();
        fake.state().progress = ProgressScript {
            polls_until_done: 2,
            ..ProgressScript::default()
        };
        let mut app = app(&fake).await;
        app.handle_key(press(KeyCode::Down)).await;

        app.handle_key(press(KeyCode::Char('s'))).await;
        assert!(matches!(app.overlay, Overlay::Menu { title: "Start Machine", .. }));
        assert!(screen(&mut app).contains("Start Headless"));

        app.handle_key(press(KeyCode::Char('h'))).await;
        assert!(app.task.is_some());
        assert!(screen(&mut app).contains("Starting"));

        app.poll_task(Duration::ZERO).await;
        app.poll_task(Duration::ZERO).await;
        assert!(app.task.is_none());
        assert_eq!(app.overlay, Overlay::None);
        assert_eq!(
            app.tree.selected_machine().map(|m| m.state.clone()),
            Some(MachineState::Running)
        );
        assert_eq!(fake.sessions_locked(), 0);
    }

    #[tokio::test]
    async fn test_power_off_needs_confirmation() {
        let fake = fake();
        let mut app = app(&fake).await;
        app.handle_key(press(KeyCode::End)).await;

        app.handle_key(press(KeyCode::Char('s'))).await;
        app.handle_key(press(KeyCode::Char('p'))).await;
        assert_eq!(app.overlay, Overlay::Confirm(Action::PowerOff));
        app.handle_key(press(KeyCode::Char('n'))).await;
        assert_eq!(app.overlay, Overlay::None);
        assert!(fake.calls().is_empty());

        app.handle_key(press(KeyCode::Char('s'))).await;
        app.handle_key(press(KeyCode::Char('p'))).await;
        app.handle_key(press(KeyCode::Char('y'))).await;
        assert_eq!(fake.calls(), vec!["lock vm-on Shared", "poweroff vm-on"]);
        assert_eq!(
            app.tree.selected_machine().map(|m| m.state.clone()),
            Some(MachineState::PoweredOff)
        );
    }

    #[tokio::test]
    async fn test_abort_shows_message() {
        let fake = fake();
        fake.state().progress = ProgressScript {
            polls_until_done: 100,
            ..ProgressScript::default()
        };
        let mut app = app(&fake).await;
        app.handle_key(press(KeyCode::End)).await;
        app.handle_key(press(KeyCode::Char('s'))).await;
        app.handle_key(press(KeyCode::Enter)).await;
        assert!(app.task.is_some());

        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL))
            .await;
        assert!(app.task.is_none());
        assert!(!app.should_quit);
        assert!(matches!(&app.overlay, Overlay::Message { text, .. } if text == "Operation aborted"));
        assert_eq!(fake.sessions_locked(), 0);

        app.handle_key(press(KeyCode::Enter)).await;
        assert_eq!(app.overlay, Overlay::None);
    }

    #[tokio::test]
    async fn test_lock_failure_shows_message() {
        let fake = fake();
        fake.state().lock_error = Some("machine is busy".to_string());
        let mut app = app(&fake).await;
        app.handle_key(press(KeyCode::End)).await;
        app.handle_key(press(KeyCode::Char('p'))).await;

        assert!(matches!(
            &app.overlay,
            Overlay::Message { title, text } if title == "Pause" && text.contains("machine is busy")
        ));
        assert!(screen(&mut app).contains("machine is busy"));
    }

    #[tokio::test]
    async fn test_reload_keeps_selection() {
        let fake = fake();
        let mut app = app(&fake).await;
        app.handle_key(press(KeyCode::End)).await;

        fake.state()
            .machines
            .push(machine("vm-new", "alpha", MachineState::Saved, &["/"]));
        app.handle_key(press(KeyCode::Char('R'))).await;

        assert_eq!(app.tree.rows().len(), 4);
        assert_eq!(
            app.tree.selection_identity(),
            Some(Selection::Machine(MachineId::new("vm-on")))
        );
        assert!(matches!(
            &app.tree.rows()[1].key,
            NodeKey::Machine { id, .. } if id.as_str() == "vm-new"
        ));
    }

    #[tokio::test]
    async fn test_details_scroll_reaches_end_and_resets() {
        let mut many = machine("vm-many", "fileserver", MachineState::Running, &["/"]);
        many.shared_folders = (0..40)
            .map(|i| SharedFolder {
                name: format!("share{i:02}"),
                host_path: format!("/srv/share{i:02}"),
                writable: true,
                auto_mount: false,
            })
            .collect();
        let fake = FakeHypervisor::new(vec![many]);
        let mut app = app(&fake).await;

        app.handle_key(press(KeyCode::Char('j'))).await;
        let text = screen(&mut app);
        assert!(text.contains("share00"));
        assert!(!text.contains("share39"));
        assert!(app.details_max_scroll > 0);

        for _ in 0..20 {
            app.handle_key(KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL))
                .await;
        }
        assert_eq!(app.details_scroll, app.details_max_scroll);
        let text = screen(&mut app);
        assert!(text.contains("share39"));
        assert!(!text.contains("share00"));

        app.handle_key(press(KeyCode::Char('K'))).await;
        assert_eq!(app.details_scroll, app.details_max_scroll - 1);
        app.handle_key(press(KeyCode::Char('J'))).await;
        app.handle_key(press(KeyCode::Char('J'))).await;
        assert_eq!(app.details_scroll, app.details_max_scroll);

        app.handle_key(press(KeyCode::Char('k'))).await;
        assert_eq!(app.details_scroll, 0);
        app.handle_key(press(KeyCode::Char('j'))).await;
        assert!(screen(&mut app).contains("share00"));
    }

    #[tokio::test]
    async fn test_help_theme_and_quit() {
        let fake = fake();
        let mut app = app(&fake).await;

        app.handle_key(press(KeyCode::Char('?'))).await;
        assert_eq!(app.overlay, Overlay::Help);
        app.handle_key(press(KeyCode::Char('q'))).await;
        assert_eq!(app.overlay, Overlay::None);
        assert!(!app.should_quit);

        let mode = app.theme_mode;
        app.handle_key(press(KeyCode::Char('t'))).await;
        assert_eq!(app.theme_mode, mode.toggle());

        app.handle_key(press(KeyCode::Char('q'))).await;
        assert!(app.should_quit);
    }
}
