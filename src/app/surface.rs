use anyhow::Result;

/// Discrete user actions the menu bar collaborator relays into the
/// controller. Everything the user can click maps to exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    StartTimer,
    StopTimer,
    /// File the pending finished session under this category.
    AssignCategory(String),
    /// Throw the pending finished session away instead of saving it.
    DiscardPending,
}

/// One preformatted stats line, e.g. "45m10s  Coding".
pub type StatLine = String;

/// Everything the menu bar should currently display, as plain strings. The
/// shell renders this without understanding any of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuModel {
    /// Short text next to the icon in the bar, "0:25:03" style.
    pub title: String,
    /// Single status line at the top of the menu.
    pub status: String,
    pub running: bool,
    /// When set, a finished session is waiting for its category. The shell
    /// shows one assignment entry per category plus a discard entry.
    pub pending: Option<String>,
    /// Categories in creation order.
    pub categories: Vec<String>,
    pub today: Vec<StatLine>,
    pub this_week: Vec<StatLine>,
    pub all_time: Vec<StatLine>,
}

/// Contract the native menu bar integration must implement. The core only
/// ever pushes display state out and receives [MenuAction]s back through a
/// channel, so this stays a thin one way sink.
#[cfg_attr(test, mockall::automock)]
pub trait MenuSurface: Send + 'static {
    fn render(&mut self, model: &MenuModel) -> Result<()>;

    /// Desktop style alert, shown outside the menu itself.
    fn notify(&mut self, summary: &str, body: &str) -> Result<()>;
}
