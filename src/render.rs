//! Terminal rendering of the layout and every page.

use indicatif::{ProgressBar, ProgressFinish, ProgressStyle};
use std::fmt::Write as _;
use tokio::time::Duration;

use crate::api::RiskResult;
use crate::app::Page;
use crate::flows::knowledge_base::STATED_MINIMUM_FACTS;
use crate::flows::risk_detector::{selector_options, MIN_FACTS};
use crate::flows::{KnowledgeBaseView, KnowledgePhase, LoginFlow, LoginPhase, RiskDetector, RiskPhase};
use crate::nav::{NavBar, NavItem};

const RULE: &str = "----------------------------------------------------------------";

pub fn nav_bar(nav: &NavBar) -> String {
    let active = nav.view().active;
    nav.items()
        .into_iter()
        .map(|item| match item {
            NavItem::Link { label, route } if route == active => format!("[{}]", label),
            NavItem::Link { label, .. } => label.to_string(),
            NavItem::UserName(name) => format!("({})", name),
            NavItem::Logout => "Logout".to_string(),
        })
        .collect::<Vec<_>>()
        .join("  ")
}

pub fn layout(nav: &NavBar, body: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "ES  Student Dropout Risk Detector | Expert System Frontend");
    let _ = writeln!(out, "    {}", nav_bar(nav));
    let _ = writeln!(out, "{}", RULE);
    out.push_str(body);
    if !body.ends_with('\n') {
        out.push('\n');
    }
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "Student Dropout Risk Detector Expert System UI");
    out
}

pub fn page(page: &Page) -> String {
    match page {
        Page::Home => home(),
        Page::KnowledgeBase(view) => knowledge_base(view),
        Page::Login(flow) => login(flow),
        Page::RiskDetector(flow) => risk_detector(flow),
    }
}

pub fn home() -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Student Dropout Risk Detector Expert System\n");
    let _ = writeln!(
        out,
        "This system helps advisors and administrators assess student dropout risk\n\
         by analyzing key student information. Enter at least three facts about a\n\
         student to receive a risk assessment and recommended actions.\n"
    );
    let _ = writeln!(out, "How it works");
    let _ = writeln!(out, "  1. Log in to access the system");
    let _ = writeln!(out, "  2. Go to the Risk Detector and enter at least three facts about a student");
    let _ = writeln!(out, "  3. Review the dropout risk assessment and recommended actions\n");
    let _ = writeln!(out, "Knowledge Base");
    let _ = writeln!(out, "  Learn about the facts the expert system uses to evaluate dropout risk.");
    let _ = writeln!(out, "  View Knowledge Base Facts: dropoutfx knowledge-base");
    out
}

pub fn knowledge_base(view: &KnowledgeBaseView) -> String {
    let mut out = String::from("Knowledge Base Facts\n\n");
    match view.phase() {
        KnowledgePhase::Loading => out.push_str("Loading facts...\n"),
        KnowledgePhase::Failed => {
            let _ = writeln!(out, "Error: {}", view.error().unwrap_or_default());
        }
        KnowledgePhase::Loaded => {
            let _ = writeln!(
                out,
                "The expert system evaluates student dropout risk based on the following\n\
                 knowledge base facts. On the Risk Detector page, you must provide at\n\
                 least {} of these facts before running an assessment.\n",
                STATED_MINIMUM_FACTS
            );
            let _ = writeln!(out, "Available Facts");
            for (label, options) in view.entries() {
                let _ = writeln!(out, "  {:<28} {}", label, options);
            }
        }
    }
    out
}

pub fn login(flow: &LoginFlow) -> String {
    let mut out = String::from("Sign in\n\n");
    if flow.phase() == LoginPhase::Redirecting {
        out.push_str("Redirecting...\n");
        return out;
    }
    out.push_str("Authenticate against your backend before accessing the expert system.\n\n");
    let _ = writeln!(out, "  Email:    {}", flow.email);
    let _ = writeln!(out, "  Password: {}", "*".repeat(flow.password.chars().count()));
    if let Some(err) = flow.error() {
        let _ = writeln!(out, "\n  Error: {}", err);
    }
    let button = if flow.is_submitting() { "Signing in..." } else { "Sign in" };
    let _ = writeln!(out, "\n  [ {} ]", button);
    out
}

pub fn risk_detector(flow: &RiskDetector) -> String {
    let mut out = String::from("Student Dropout Risk Detector\n\n");
    match (flow.phase(), flow.catalog()) {
        (RiskPhase::Unauthenticated, _) => {
            out.push_str("Redirecting to login...\n");
            return out;
        }
        (RiskPhase::CheckingAuth, _) | (RiskPhase::LoadingFacts, None) => {
            match flow.error() {
                Some(err) => {
                    let _ = writeln!(out, "Error: {}", err);
                }
                None => out.push_str("Loading facts...\n"),
            }
            return out;
        }
        _ => {}
    }
    let Some(catalog) = flow.catalog() else {
        return out;
    };

    let _ = writeln!(
        out,
        "Provide at least three facts about a student to evaluate their dropout risk.\n"
    );
    for fact in catalog.iter() {
        let selected = flow.draft().get(&fact.id).unwrap_or("");
        let choices = selector_options(fact)
            .into_iter()
            .map(|o| if o.value == selected { format!("({})", o.label) } else { o.label.to_string() })
            .collect::<Vec<_>>()
            .join(" | ");
        let _ = writeln!(out, "  {:<24} {}", fact.label, choices);
    }
    let _ = writeln!(
        out,
        "\n  Facts provided: {} / {}    Minimum required: {}",
        flow.filled_count(),
        flow.total_facts(),
        MIN_FACTS
    );
    if let Some(err) = flow.error() {
        let _ = writeln!(out, "  Error: {}", err);
    }
    let button = if flow.phase() == RiskPhase::Submitting { "Evaluating..." } else { "Run Expert System" };
    let state = if flow.can_submit() { "" } else { " (disabled)" };
    let _ = writeln!(out, "  [ {} ]{}\n", button, state);
    out.push_str(&result_panel(flow.result()));
    out
}

pub fn result_panel(result: Option<&RiskResult>) -> String {
    let mut out = String::from("Dropout Risk Result\n");
    let Some(result) = result else {
        out.push_str(
            "  Run the expert system to see the predicted dropout risk level,\n  \
             explanation, and recommended remedy actions.\n",
        );
        return out;
    };
    let _ = writeln!(out, "  Risk level: {}", result.risk_level);
    let _ = writeln!(out, "  Will drop out: {}", if result.will_dropout { "Yes" } else { "No" });
    let _ = writeln!(out, "\n  Explanation\n  {}", result.explanation);
    if !result.remedies.is_empty() {
        let _ = writeln!(out, "\n  Recommended actions");
        for remedy in &result.remedies {
            let _ = writeln!(out, "  \u{2022} {}", remedy);
        }
    }
    out
}

// =============================================================================
// Loading spinner
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinnerSize {
    Sm,
    Md,
    Lg,
}

impl SpinnerSize {
    fn ticks(&self) -> &'static [&'static str] {
        match self {
            SpinnerSize::Sm => &["-", "\\", "|", "/", "-"],
            SpinnerSize::Md => &["◐", "◓", "◑", "◒", "◐"],
            SpinnerSize::Lg => &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠋"],
        }
    }
}

/// Start a spinner on stderr. It clears itself when the bar is dropped.
pub fn spinner(size: SpinnerSize, message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_finish(ProgressFinish::AndClear);
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(size.ticks()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}
