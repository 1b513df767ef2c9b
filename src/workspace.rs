use crate::error::{EngineError, Result};
use crate::session::explorer::{ExplorerSession, SessionServices};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TabId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaneId {
    Left,
    Right,
}

impl PaneId {
    pub fn other(self) -> Self {
        match self {
            PaneId::Left => PaneId::Right,
            PaneId::Right => PaneId::Left,
        }
    }
}

pub struct Pane {
    id: PaneId,
    session: ExplorerSession,
}

impl Pane {
    pub fn id(&self) -> PaneId {
        self.id
    }

    pub fn title(&self) -> String {
        self.session.title()
    }

    pub fn session(&self) -> &ExplorerSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ExplorerSession {
        &mut self.session
    }
}

pub struct Tab {
    id: TabId,
    left: Pane,
    right: Option<Pane>,
    active_pane: PaneId,
    split_ratio: f32,
}

impl Tab {
    pub fn id(&self) -> TabId {
        self.id
    }

    pub fn is_dual_pane(&self) -> bool {
        self.right.is_some()
    }

    pub fn active_pane(&self) -> PaneId {
        self.active_pane
    }

    pub fn split_ratio(&self) -> f32 {
        self.split_ratio
    }

    pub fn pane(&self, id: PaneId) -> Option<&Pane> {
        match id {
            PaneId::Left => Some(&self.left),
            PaneId::Right => self.right.as_ref(),
        }
    }

    pub fn pane_mut(&mut self, id: PaneId) -> Option<&mut Pane> {
        match id {
            PaneId::Left => Some(&mut self.left),
            PaneId::Right => self.right.as_mut(),
        }
    }

    /// Directory name of the active pane.
    pub fn title(&self) -> String {
        self.pane(self.active_pane)
            .unwrap_or(&self.left)
            .title()
    }

    fn panes_mut(&mut self) -> impl Iterator<Item = &mut Pane> {
        std::iter::once(&mut self.left).chain(self.right.as_mut())
    }

    async fn dispose(&mut self) {
        for pane in self.panes_mut() {
            pane.session.dispose().await;
        }
    }
}

/// Tabs of one window. Every pane owns its session; all sessions share the
/// window's services.
pub struct Workspace {
    services: SessionServices,
    tabs: Vec<Tab>,
    active: usize,
    next_id: u64,
}

impl Workspace {
    /// An empty workspace; call [`create_tab`](Self::create_tab) to open the
    /// first tab.
    pub fn new(services: SessionServices) -> Self {
        Self {
            services,
            tabs: Vec::new(),
            active: 0,
            next_id: 1,
        }
    }

    /// Workspace with one tab at `path` (or the configured start directory).
    pub async fn open(services: SessionServices, path: Option<&str>) -> Result<Self> {
        let mut workspace = Self::new(services);
        workspace.create_tab(path).await?;
        Ok(workspace)
    }

    pub fn services(&self) -> &SessionServices {
        &self.services
    }

    async fn new_session(&self, path: &str) -> Result<ExplorerSession> {
        let mut session = ExplorerSession::new(self.services.clone());
        session.navigate(path).await?;
        Ok(session)
    }

    /// Open a tab and make it active. Without `path` the panes start where the
    /// active tab's panes are; a dual-pane active tab yields a dual-pane tab.
    pub async fn create_tab(&mut self, path: Option<&str>) -> Result<TabId> {
        let (left_path, right_path, dual) = match (path, self.active_tab()) {
            (Some(p), current) => {
                let dual = current.is_some_and(Tab::is_dual_pane);
                (p.to_string(), p.to_string(), dual)
            }
            (None, Some(current)) => {
                let left = current
                    .left
                    .session
                    .current_path()
                    .map(str::to_string)
                    .unwrap_or_else(|| self.services.settings.start_path());
                let right = current
                    .right
                    .as_ref()
                    .and_then(|p| p.session.current_path())
                    .map(str::to_string)
                    .unwrap_or_else(|| left.clone());
                (left, right, current.is_dual_pane())
            }
            (None, None) => {
                let start = self.services.settings.start_path();
                (start.clone(), start, false)
            }
        };

        let mut left = self.new_session(&left_path).await?;
        let right = if dual {
            match self.new_session(&right_path).await {
                Ok(session) => Some(session),
                Err(e) => {
                    left.dispose().await;
                    tracing::warn!(event = "workspace.tab_failed", path = %right_path, error = %e);
                    return Err(e);
                }
            }
        } else {
            None
        };

        let id = TabId(self.next_id);
        self.next_id += 1;
        self.tabs.push(Tab {
            id,
            left: Pane { id: PaneId::Left, session: left },
            right: right.map(|session| Pane { id: PaneId::Right, session }),
            active_pane: PaneId::Left,
            split_ratio: self.services.settings.layout.split_ratio,
        });
        self.active = self.tabs.len() - 1;
        tracing::debug!(event = "workspace.tab_created", tab = id.0, path = %left_path, dual);
        Ok(id)
    }

    /// Close a tab and release its sessions. The last tab cannot be closed.
    pub async fn close_tab(&mut self, id: TabId) -> Result<()> {
        let index = self.index_of(id)?;
        if self.tabs.len() == 1 {
            return Err(EngineError::LastTab);
        }
        let mut tab = self.tabs.remove(index);
        tab.dispose().await;

        if index < self.active || (index == self.active && index > 0) {
            self.active -= 1;
        }
        self.active = self.active.min(self.tabs.len() - 1);
        tracing::debug!(event = "workspace.tab_closed", tab = id.0);
        Ok(())
    }

    fn index_of(&self, id: TabId) -> Result<usize> {
        self.tabs
            .iter()
            .position(|t| t.id == id)
            .ok_or(EngineError::UnknownTab(id.0))
    }

    pub fn activate_tab(&mut self, id: TabId) -> Result<()> {
        self.active = self.index_of(id)?;
        Ok(())
    }

    pub fn next_tab(&mut self) {
        if !self.tabs.is_empty() {
            self.active = (self.active + 1) % self.tabs.len();
        }
    }

    pub fn prev_tab(&mut self) {
        if !self.tabs.is_empty() {
            self.active = (self.active + self.tabs.len() - 1) % self.tabs.len();
        }
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn tab_ids(&self) -> Vec<TabId> {
        self.tabs.iter().map(|t| t.id).collect()
    }

    pub fn titles(&self) -> Vec<(TabId, String)> {
        self.tabs.iter().map(|t| (t.id, t.title())).collect()
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.tabs.get(self.active)
    }

    pub fn active_tab_mut(&mut self) -> Option<&mut Tab> {
        self.tabs.get_mut(self.active)
    }

    pub fn active_tab_id(&self) -> Option<TabId> {
        self.active_tab().map(|t| t.id)
    }

    /// Focus a pane of the active tab. Focusing the right pane of a
    /// single-pane tab is ignored.
    pub fn set_active_pane(&mut self, pane: PaneId) {
        if let Some(tab) = self.active_tab_mut() {
            if pane == PaneId::Left || tab.right.is_some() {
                tab.active_pane = pane;
            }
        }
    }

    pub fn switch_pane(&mut self) {
        if let Some(tab) = self.active_tab_mut() {
            if tab.right.is_some() {
                tab.active_pane = tab.active_pane.other();
            }
        }
    }

    /// Add a right pane at the left pane's directory.
    pub async fn enable_dual_pane(&mut self) -> Result<()> {
        let path = {
            let tab = self.active_tab().ok_or(EngineError::NoCurrentDirectory)?;
            if tab.right.is_some() {
                return Ok(());
            }
            tab.left
                .session
                .current_path()
                .map(str::to_string)
                .ok_or(EngineError::NoCurrentDirectory)?
        };
        let session = self.new_session(&path).await?;
        if let Some(tab) = self.active_tab_mut() {
            tab.right = Some(Pane { id: PaneId::Right, session });
        }
        Ok(())
    }

    /// Drop the right pane and refocus the left one.
    pub async fn disable_dual_pane(&mut self) {
        let Some(tab) = self.active_tab_mut() else {
            return;
        };
        tab.active_pane = PaneId::Left;
        if let Some(mut right) = tab.right.take() {
            right.session.dispose().await;
        }
    }

    pub async fn toggle_dual_pane(&mut self) -> Result<()> {
        if self.active_tab().is_some_and(Tab::is_dual_pane) {
            self.disable_dual_pane().await;
            Ok(())
        } else {
            self.enable_dual_pane().await
        }
    }

    /// Clamp into the configured divider bounds and apply to the active tab.
    pub fn set_split_ratio(&mut self, ratio: f32) -> f32 {
        let (lo, hi) = self.services.settings.layout.bounds();
        let clamped = if ratio.is_nan() { 0.5_f32.clamp(lo, hi) } else { ratio.clamp(lo, hi) };
        if let Some(tab) = self.active_tab_mut() {
            tab.split_ratio = clamped;
        }
        clamped
    }

    pub fn active_session(&self) -> Option<&ExplorerSession> {
        let tab = self.active_tab()?;
        tab.pane(tab.active_pane).map(Pane::session)
    }

    pub fn active_session_mut(&mut self) -> Option<&mut ExplorerSession> {
        let tab = self.active_tab_mut()?;
        let pane = tab.active_pane;
        tab.pane_mut(pane).map(Pane::session_mut)
    }

    /// The inactive pane's session in dual-pane mode, the usual copy/move
    /// target.
    pub fn other_session(&self) -> Option<&ExplorerSession> {
        let tab = self.active_tab()?;
        tab.pane(tab.active_pane.other()).map(Pane::session)
    }

    /// Pump every pane's listing. Returns the number of new entries.
    pub fn poll(&mut self) -> usize {
        self.tabs
            .iter_mut()
            .flat_map(Tab::panes_mut)
            .map(|pane| pane.session.poll())
            .sum()
    }
}
