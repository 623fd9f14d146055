//! Tray backend built on `tray-icon` and `tao`. The OS owns the main thread
//! event loop, the core runs on a worker thread with its own current thread
//! runtime, and the two sides talk through the action channel in one
//! direction and the event loop proxy in the other.

use std::{collections::HashMap, path::PathBuf, thread};

use anyhow::{anyhow, Result};
use tao::event::{Event, StartCause};
use tao::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use tray_icon::menu::{Menu, MenuEvent, MenuId, MenuItem, PredefinedMenuItem};
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

use crate::{
    app::{
        start_app,
        surface::{MenuAction, MenuModel, MenuSurface},
    },
    utils::{clock::DefaultClock, runtime::single_thread_runtime},
};

#[derive(Debug, Clone)]
enum UserEvent {
    Menu(MenuEvent),
    Render(MenuModel),
    Notify { summary: String, body: String },
}

/// The controller's view of the menu bar: display state goes out through
/// the event loop proxy, nothing comes back this way.
struct TraySurface {
    proxy: EventLoopProxy<UserEvent>,
}

impl MenuSurface for TraySurface {
    fn render(&mut self, model: &MenuModel) -> Result<()> {
        self.proxy
            .send_event(UserEvent::Render(model.clone()))
            .map_err(|_| anyhow!("menu bar event loop is gone"))
    }

    fn notify(&mut self, summary: &str, body: &str) -> Result<()> {
        self.proxy
            .send_event(UserEvent::Notify {
                summary: summary.to_string(),
                body: body.to_string(),
            })
            .map_err(|_| anyhow!("menu bar event loop is gone"))
    }
}

#[derive(Debug, Clone)]
enum TrayAction {
    Forward(MenuAction),
    Quit,
}

pub fn run(data_dir: PathBuf) -> Result<()> {
    let event_loop = EventLoopBuilder::<UserEvent>::with_user_event().build();
    let proxy = event_loop.create_proxy();

    let proxy_for_menu = proxy.clone();
    MenuEvent::set_event_handler(Some(move |event| {
        let _ = proxy_for_menu.send_event(UserEvent::Menu(event));
    }));

    let (action_tx, action_rx) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();

    let surface = TraySurface { proxy };
    let core_shutdown = shutdown.clone();
    let core_dir = data_dir;
    thread::spawn(move || {
        let runtime = match single_thread_runtime() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Couldn't build the core runtime {e:?}");
                return;
            }
        };
        let result = runtime.block_on(start_app(
            core_dir,
            surface,
            action_rx,
            core_shutdown,
            DefaultClock,
        ));
        if let Err(e) = result {
            error!("Menu controller stopped with an error {e:?}");
        }
    });

    let icons = IconSet::new();
    let mut tray = TrayState {
        icon: None,
        actions: HashMap::new(),
        model: None,
        notice: None,
        action_tx,
        shutdown,
    };

    event_loop.run(move |event, _target, control_flow| {
        *control_flow = ControlFlow::Wait;

        match event {
            Event::NewEvents(StartCause::Init) => {
                let built = TrayIconBuilder::new()
                    .with_tooltip("Deepwork")
                    .with_title("0:00:00")
                    .with_icon(icons.idle.clone())
                    .build();

                match built {
                    Ok(icon) => {
                        tray.icon = Some(icon);
                        tray.rebuild(&icons);
                    }
                    Err(e) => error!("Couldn't create the tray icon: {e}"),
                }
            }
            Event::UserEvent(UserEvent::Render(model)) => {
                tray.model = Some(model);
                tray.rebuild(&icons);
            }
            Event::UserEvent(UserEvent::Notify { summary, body }) => {
                tray.notice = Some(format!("{summary}: {body}"));
                tray.rebuild(&icons);
            }
            Event::UserEvent(UserEvent::Menu(menu_event)) => {
                match tray.actions.get(&menu_event.id) {
                    Some(TrayAction::Quit) => {
                        tray.shutdown.cancel();
                        *control_flow = ControlFlow::Exit;
                    }
                    Some(TrayAction::Forward(action)) => {
                        if tray.action_tx.send(action.clone()).is_err() {
                            warn!("Menu controller is gone, shutting down");
                            tray.shutdown.cancel();
                            *control_flow = ControlFlow::Exit;
                        }
                    }
                    None => {}
                }
            }
            _ => {}
        }
    });
}

struct TrayState {
    icon: Option<TrayIcon>,
    /// Menu item ids of the most recent rebuild, mapped to what clicking
    /// them means.
    actions: HashMap<MenuId, TrayAction>,
    model: Option<MenuModel>,
    /// Last notification, kept visible in the menu until the next one.
    notice: Option<String>,
    action_tx: mpsc::UnboundedSender<MenuAction>,
    shutdown: CancellationToken,
}

impl TrayState {
    /// The item set changes with every state transition, so the menu is
    /// rebuilt from the model instead of patching items in place.
    fn rebuild(&mut self, icons: &IconSet) {
        let Some(icon) = self.icon.as_ref() else {
            return;
        };
        let Some(model) = self.model.as_ref() else {
            return;
        };

        self.actions.clear();
        let menu = Menu::new();

        append_disabled(&menu, &format!("Status: {}", model.status));
        if let Some(notice) = self.notice.as_ref() {
            append_disabled(&menu, notice);
        }
        append_separator(&menu);

        let can_start = !model.running && model.pending.is_none();
        let start_item = MenuItem::new("Start deep work", can_start, None);
        self.actions.insert(
            start_item.id().clone(),
            TrayAction::Forward(MenuAction::StartTimer),
        );
        append_item(&menu, &start_item);

        let stop_item = MenuItem::new("Stop and file session", model.running, None);
        self.actions.insert(
            stop_item.id().clone(),
            TrayAction::Forward(MenuAction::StopTimer),
        );
        append_item(&menu, &stop_item);

        if let Some(pending) = model.pending.as_ref() {
            append_separator(&menu);
            append_disabled(&menu, pending);
            for category in &model.categories {
                let item = MenuItem::new(category, true, None);
                self.actions.insert(
                    item.id().clone(),
                    TrayAction::Forward(MenuAction::AssignCategory(category.clone())),
                );
                append_item(&menu, &item);
            }
            let discard_item = MenuItem::new("Discard session", true, None);
            self.actions.insert(
                discard_item.id().clone(),
                TrayAction::Forward(MenuAction::DiscardPending),
            );
            append_item(&menu, &discard_item);
        }

        append_stats(&menu, "Today", &model.today);
        append_stats(&menu, "This week", &model.this_week);
        append_stats(&menu, "All time", &model.all_time);

        append_separator(&menu);
        let quit_item = MenuItem::new("Quit Deepwork", true, None);
        self.actions.insert(quit_item.id().clone(), TrayAction::Quit);
        append_item(&menu, &quit_item);

        icon.set_menu(Some(Box::new(menu)));
        icon.set_title(Some(model.title.as_str()));
        let _ = icon.set_icon(Some(icons.state(model.running)));
    }
}

fn append_item(menu: &Menu, item: &MenuItem) {
    if let Err(e) = menu.append(item) {
        error!("Couldn't append menu item: {e}");
    }
}

fn append_disabled(menu: &Menu, text: &str) {
    append_item(menu, &MenuItem::new(text, false, None));
}

fn append_separator(menu: &Menu) {
    if let Err(e) = menu.append(&PredefinedMenuItem::separator()) {
        error!("Couldn't append menu separator: {e}");
    }
}

fn append_stats(menu: &Menu, header: &str, lines: &[String]) {
    append_separator(menu);
    append_disabled(menu, header);
    if lines.is_empty() {
        append_disabled(menu, "  nothing yet");
        return;
    }
    for line in lines {
        append_disabled(menu, &format!("  {}", line.replace('\t', "  ")));
    }
}

struct IconSet {
    idle: Icon,
    running: Icon,
}

impl IconSet {
    fn new() -> Self {
        Self {
            idle: build_state_icon([150, 150, 150]),
            running: build_state_icon([46, 204, 113]),
        }
    }

    fn state(&self, running: bool) -> Icon {
        if running {
            self.running.clone()
        } else {
            self.idle.clone()
        }
    }
}

/// A small filled disc, drawn by hand so the binary needs no asset files.
fn build_state_icon(fill_rgb: [u8; 3]) -> Icon {
    let (width, height) = (18i32, 18i32);
    let mut rgba = Vec::with_capacity((width * height * 4) as usize);
    let fill = [fill_rgb[0], fill_rgb[1], fill_rgb[2], 255];
    let background = [0, 0, 0, 0];

    let center = (width - 1) as f32 / 2.0;
    let radius = width as f32 / 2.0 - 2.0;
    for y in 0..height {
        for x in 0..width {
            let dx = x as f32 - center;
            let dy = y as f32 - center;
            let pixel = if dx * dx + dy * dy <= radius * radius {
                fill
            } else {
                background
            };
            rgba.extend_from_slice(&pixel);
        }
    }

    Icon::from_rgba(rgba, width as u32, height as u32).expect("valid tray icon")
}
