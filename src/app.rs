//! Application shell: mounts one page at a time, follows redirects, and keeps
//! the navigation bar in step with every route change.

use anyhow::{anyhow, Result};
use std::sync::Arc;

use crate::api::ExpertSystem;
use crate::config::Config;
use crate::flows::{FormError, KnowledgeBaseView, LoginFlow, MountHandle, RiskDetector};
use crate::logging::{self, obj, v_str, Domain};
use crate::nav::{NavBar, Route};
use crate::session::SessionContext;

const MAX_REDIRECTS: usize = 4;

pub enum Page {
    Home,
    KnowledgeBase(KnowledgeBaseView),
    Login(LoginFlow),
    RiskDetector(RiskDetector),
}

impl Page {
    fn mount_handle(&self) -> Option<MountHandle> {
        match self {
            Page::Home => None,
            Page::KnowledgeBase(v) => Some(v.mount_handle()),
            Page::Login(f) => Some(f.mount_handle()),
            Page::RiskDetector(f) => Some(f.mount_handle()),
        }
    }

    /// Inline error currently shown on the page, if any.
    pub fn error(&self) -> Option<String> {
        match self {
            Page::Home => None,
            Page::KnowledgeBase(v) => v.error().map(str::to_string),
            Page::Login(f) => f.error(),
            Page::RiskDetector(f) => f.error().map(str::to_string),
        }
    }
}

pub struct App {
    cfg: Config,
    api: Arc<dyn ExpertSystem>,
    session: SessionContext,
    nav: NavBar,
    route: Route,
    page: Page,
}

impl App {
    pub fn new(cfg: Config, api: Arc<dyn ExpertSystem>, session: SessionContext) -> Self {
        let nav = NavBar::new(session.clone(), Route::Home);
        Self {
            cfg,
            api,
            session,
            nav,
            route: Route::Home,
            page: Page::Home,
        }
    }

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut Page {
        &mut self.page
    }

    pub fn nav(&self) -> &NavBar {
        &self.nav
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Unmount the current page, then mount `route`, following redirects
    /// until a page settles. Fetch failures stay on the page as its error.
    pub async fn navigate(&mut self, route: Route) -> Result<()> {
        let mut target = route;
        for _ in 0..=MAX_REDIRECTS {
            if let Some(handle) = self.page.mount_handle() {
                handle.unmount();
            }
            self.route = target;
            self.nav.on_route_change(target);
            logging::info(Domain::Nav, "nav.route", obj(&[("route", v_str(target.path()))]));

            match self.mount(target).await {
                Some(next) => {
                    self.redirect(target, next);
                    target = next;
                }
                None => return Ok(()),
            }
        }
        Err(anyhow!("too many redirects starting from {}", route.path()))
    }

    fn redirect(&self, from: Route, to: Route) {
        logging::info(
            Domain::Nav,
            "nav.redirect",
            obj(&[("route", v_str(to.path())), ("from", v_str(from.path()))]),
        );
    }

    async fn mount(&mut self, route: Route) -> Option<Route> {
        let min_visible = self.cfg.min_visible();
        match route {
            Route::Home => {
                self.page = Page::Home;
                None
            }
            Route::KnowledgeBase => {
                let mut view = KnowledgeBaseView::new(self.api.clone());
                // A failed fetch is rendered by the page itself.
                let _ = view.load().await;
                self.page = Page::KnowledgeBase(view);
                None
            }
            Route::Login => {
                let mut flow = LoginFlow::new(self.api.clone(), self.session.clone(), min_visible);
                let redirect = flow.mount();
                self.page = Page::Login(flow);
                redirect
            }
            Route::RiskDetector => {
                let mut flow = RiskDetector::new(
                    self.api.clone(),
                    self.session.clone(),
                    min_visible,
                    self.cfg.reveal_settle(),
                );
                if let Some(redirect) = flow.mount() {
                    self.page = Page::RiskDetector(flow);
                    return Some(redirect);
                }
                let _ = flow.load_facts().await;
                self.page = Page::RiskDetector(flow);
                None
            }
        }
    }

    /// Sign in through the login page and move on to the protected area.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<(), FormError> {
        if self.route != Route::Login {
            self.navigate(Route::Login)
                .await
                .map_err(|e| FormError::Navigation(e.to_string()))?;
        }
        let next = match &mut self.page {
            Page::Login(flow) => {
                flow.set_credentials(email, password);
                flow.submit().await?
            }
            // Already signed in: the login page redirected straight away.
            _ => return Ok(()),
        };
        self.navigate(next)
            .await
            .map_err(|e| FormError::Navigation(e.to_string()))
    }

    /// Re-read the stored session, picking up writes made by another process,
    /// and refresh the nav bar. Returns whether the nav bar changed.
    pub fn sync_session(&mut self) -> Result<bool> {
        self.session.reload()?;
        let changed = self.nav.sync();
        if changed {
            logging::info(
                Domain::Nav,
                "nav.sync",
                obj(&[("route", v_str(self.route.path()))]),
            );
        }
        Ok(changed)
    }

    pub async fn logout(&mut self) -> Result<()> {
        let next = self.nav.logout()?;
        self.navigate(next).await
    }
}
