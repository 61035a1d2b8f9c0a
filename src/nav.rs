use anyhow::Result;
use tokio::sync::watch;

use crate::logging::{self, obj, v_bool, v_str, Domain};
use crate::session::{Session, SessionContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    KnowledgeBase,
    Login,
    RiskDetector,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::KnowledgeBase => "/knowledge-base",
            Route::Login => "/login",
            Route::RiskDetector => "/risk-detector",
        }
    }

    pub fn is_protected(&self) -> bool {
        matches!(self, Route::RiskDetector)
    }
}

/// Where a visit to `route` must go instead, if anywhere.
pub fn guard(route: Route, session: &Session) -> Option<Route> {
    if route.is_protected() && !session.is_logged_in() {
        Some(Route::Login)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavView {
    pub logged_in: bool,
    pub display_name: Option<String>,
    pub active: Route,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavItem {
    Link { label: &'static str, route: Route },
    UserName(String),
    Logout,
}

pub struct NavBar {
    session: SessionContext,
    updates: watch::Receiver<Session>,
    view: NavView,
}

impl NavBar {
    pub fn new(session: SessionContext, active: Route) -> Self {
        let updates = session.subscribe();
        let view = Self::derive(&session.read(), active);
        Self { session, updates, view }
    }

    fn derive(session: &Session, active: Route) -> NavView {
        NavView {
            logged_in: session.is_logged_in(),
            display_name: session.display_name().map(str::to_string),
            active,
        }
    }

    /// Re-derive on every route change.
    pub fn on_route_change(&mut self, route: Route) {
        let session = self.updates.borrow_and_update().clone();
        self.view = Self::derive(&session, route);
    }

    /// Pick up session writes made since the last derive. Returns whether the
    /// view changed.
    pub fn sync(&mut self) -> bool {
        if !self.updates.has_changed().unwrap_or(false) {
            return false;
        }
        let before = self.view.clone();
        self.on_route_change(before.active);
        self.view != before
    }

    pub fn view(&self) -> &NavView {
        &self.view
    }

    pub fn items(&self) -> Vec<NavItem> {
        let mut items = vec![NavItem::Link {
            label: "Knowledge Base",
            route: Route::KnowledgeBase,
        }];
        if self.view.logged_in {
            if let Some(name) = &self.view.display_name {
                items.push(NavItem::UserName(name.clone()));
            }
            items.push(NavItem::Logout);
        } else {
            items.push(NavItem::Link {
                label: "Login",
                route: Route::Login,
            });
        }
        items.push(NavItem::Link {
            label: "Risk Detector",
            route: Route::RiskDetector,
        });
        items
    }

    /// Clear the session and send the user to the login page.
    pub fn logout(&mut self) -> Result<Route> {
        self.session.clear()?;
        self.on_route_change(Route::Login);
        logging::info(
            Domain::Nav,
            "nav.logout",
            obj(&[("route", v_str(Route::Login.path())), ("logged_in", v_bool(self.view.logged_in))]),
        );
        Ok(Route::Login)
    }
}
