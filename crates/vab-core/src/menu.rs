//! Interactive menu: a small state machine over fixed button labels and
//! force-reply prompts.
//!
//! The current [`MenuState`] is stored per chat so that a button press or a
//! reply is interpreted in the context the user last saw.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc, Weekday};

use crate::{
    domain::{weekday_short, Category, ChatId, Phase, PreferenceUpdate, WEEKDAYS},
    engine::NotificationEngine,
    errors::Error,
    formatting::{escape_markdown, truncate_message, Icon},
    messaging::types::ReplyKeyboard,
    ports::RecordStore,
    render::Renderer,
    security::Cooldown,
    utils::{parse_delivery_time, parse_proposal_id, parse_timezone_offset},
    Result,
};

const MAIN_COLUMNS: usize = 2;
const CALENDAR_COLUMNS: usize = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuState {
    Main,
    Settings,
    Calendar(Category),
}

impl MenuState {
    /// Value stored in `context.menu`.
    pub fn as_str(self) -> &'static str {
        match self {
            MenuState::Main => "main",
            MenuState::Settings => "settings",
            MenuState::Calendar(c) => c.as_str(),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "main" => Some(MenuState::Main),
            "settings" => Some(MenuState::Settings),
            other => match Category::parse(other)? {
                Category::General => None,
                c => Some(MenuState::Calendar(c)),
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Button {
    Informal,
    Formal,
    Completed,
    Digest,
    Discussions,
    ProposalLookup,
    Settings,
    MainMenu,
    Timezone,
    Category(Category),
    ToggleDay(Weekday),
    DeliveryTime,
    AddProposal,
    RemoveProposal,
}

const FIXED_BUTTONS: [Button; 16] = [
    Button::Informal,
    Button::Formal,
    Button::Completed,
    Button::Digest,
    Button::Discussions,
    Button::ProposalLookup,
    Button::Settings,
    Button::MainMenu,
    Button::Timezone,
    Button::Category(Category::Digest),
    Button::Category(Category::PhaseEntry),
    Button::Category(Category::SpecificProposals),
    Button::Category(Category::ExtraAlerts),
    Button::DeliveryTime,
    Button::AddProposal,
    Button::RemoveProposal,
];

impl Button {
    /// Label as shown on the keyboard. Weekday toggles show their "off" state.
    pub fn label(self) -> String {
        match self {
            Button::Informal => format!("{} Informal", Icon::Informal.glyph()),
            Button::Formal => format!("{} Formal", Icon::Formal.glyph()),
            Button::Completed => format!("{} Completed", Icon::Completed.glyph()),
            Button::Digest => format!("{} Digest", Icon::Digest.glyph()),
            Button::Discussions => format!("{} Discussions", Icon::Discussions.glyph()),
            Button::ProposalLookup => format!("{} Proposal #", Icon::Proposal.glyph()),
            Button::Settings => format!("{} Settings", Icon::Settings.glyph()),
            Button::MainMenu => format!("{} Main Menu", Icon::Home.glyph()),
            Button::Timezone => format!("{} Timezone", Icon::Settings.glyph()),
            Button::Category(c) => category_label(c),
            Button::ToggleDay(day) => day_label(day, false),
            Button::DeliveryTime => format!("{} Time", Icon::Time.glyph()),
            Button::AddProposal => "Add #".to_string(),
            Button::RemoveProposal => "Remove #".to_string(),
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(b) = FIXED_BUTTONS.into_iter().find(|b| b.label() == text) {
            return Some(b);
        }
        WEEKDAYS
            .into_iter()
            .find(|d| day_label(*d, true) == text || day_label(*d, false) == text)
            .map(Button::ToggleDay)
    }
}

fn category_label(category: Category) -> String {
    match category {
        Category::Digest => format!("{} Daily Digest", Icon::Digest.glyph()),
        Category::PhaseEntry => format!("{} New Proposals", Icon::NewEntry.glyph()),
        Category::SpecificProposals => format!("{} My Proposals", Icon::Proposal.glyph()),
        Category::ExtraAlerts => format!("{} Extra Alerts", Icon::Alert.glyph()),
        Category::General => format!("{} General", Icon::Settings.glyph()),
    }
}

fn category_description(category: Category) -> &'static str {
    match category {
        Category::Digest => "A summary of votes ending without a quorum, recently completed votes and discussions, sent at your chosen time.",
        Category::PhaseEntry => "An alert as soon as a proposal enters informal or formal voting.",
        Category::SpecificProposals => "Alerts when the proposals you follow enter informal or formal voting.",
        Category::ExtraAlerts => "Alerts about votes that failed without a quorum or are about to expire without one.",
        Category::General => "",
    }
}

fn day_label(day: Weekday, on: bool) -> String {
    let icon = if on { Icon::Completed } else { Icon::Off };
    format!("{} {}", icon.glyph(), weekday_short(day))
}

/// Force-reply prompts; a reply is matched by the prompt text it answers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prompt {
    DigestTime,
    Timezone,
    ProposalLookup,
    AddProposal,
    RemoveProposal,
}

impl Prompt {
    const ALL: [Prompt; 5] = [
        Prompt::DigestTime,
        Prompt::Timezone,
        Prompt::ProposalLookup,
        Prompt::AddProposal,
        Prompt::RemoveProposal,
    ];

    pub fn text(self) -> &'static str {
        match self {
            Prompt::DigestTime => "Send the digest time in hh:mm format (your local time):",
            Prompt::Timezone => "Send your UTC offset in hours, from -12 to 12:",
            Prompt::ProposalLookup => "Send a proposal number:",
            Prompt::AddProposal => "Send a proposal number to follow:",
            Prompt::RemoveProposal => "Send a proposal number to stop following:",
        }
    }

    pub fn from_text(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.text() == text.trim())
    }

    /// Menu in which a reply to this prompt is accepted.
    fn expected_state(self) -> MenuState {
        match self {
            Prompt::DigestTime => MenuState::Calendar(Category::Digest),
            Prompt::Timezone => MenuState::Settings,
            Prompt::ProposalLookup => MenuState::Main,
            Prompt::AddProposal | Prompt::RemoveProposal => {
                MenuState::Calendar(Category::SpecificProposals)
            }
        }
    }
}

/// Something the user sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    Start { name: String },
    Text(String),
    /// Reply to an earlier message with the given text.
    Reply { to: String, text: String },
}

/// Something to send back, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Markdown(String),
    Plain(String),
    Keyboard { text: String, keyboard: ReplyKeyboard },
    ForceReply(String),
}

pub const UNAVAILABLE: &str = "The voting portal is not reachable right now. Please try again later.";

pub struct Menu {
    engine: Arc<NotificationEngine>,
    store: Arc<dyn RecordStore>,
    cooldown: Cooldown,
    message_limit: usize,
}

impl Menu {
    pub fn new(
        engine: Arc<NotificationEngine>,
        store: Arc<dyn RecordStore>,
        action_delay: Duration,
        message_limit: usize,
    ) -> Self {
        Self {
            engine,
            store,
            cooldown: Cooldown::new(action_delay),
            message_limit,
        }
    }

    fn renderer(&self) -> &Renderer {
        self.engine.renderer()
    }

    async fn state(&self, chat: ChatId) -> Result<MenuState> {
        Ok(self.store.menu(chat).await?.unwrap_or(MenuState::Main))
    }

    pub async fn handle(&self, chat: ChatId, input: Input, now: DateTime<Utc>) -> Result<Vec<Reply>> {
        match input {
            Input::Start { name } => {
                let mut out = vec![Reply::Plain(format!("Hello {name}"))];
                out.push(self.enter(chat, MenuState::Main).await?);
                Ok(out)
            }
            Input::Text(text) => match Button::parse(&text) {
                Some(button) => self.press(chat, button, now).await,
                None => Ok(vec![self.show_current(chat).await?]),
            },
            Input::Reply { to, text } => match Prompt::from_text(&to) {
                Some(prompt) => self.answer(chat, prompt, &text).await,
                None => Ok(vec![self.show_current(chat).await?]),
            },
        }
    }

    async fn press(&self, chat: ChatId, button: Button, now: DateTime<Utc>) -> Result<Vec<Reply>> {
        match button {
            Button::Informal
            | Button::Formal
            | Button::Completed
            | Button::Digest
            | Button::Discussions => Ok(self.query(chat, button, now).await.into_iter().collect()),
            Button::ProposalLookup => Ok(vec![Reply::ForceReply(
                Prompt::ProposalLookup.text().to_string(),
            )]),
            Button::Settings => Ok(vec![self.enter(chat, MenuState::Settings).await?]),
            Button::MainMenu => Ok(vec![self.enter(chat, MenuState::Main).await?]),
            Button::Timezone => {
                let offset = self
                    .store
                    .preference(chat, Category::General)
                    .await?
                    .timezone_offset;
                Ok(vec![
                    Reply::Plain(format!("Current timezone offset is {offset:+}")),
                    Reply::ForceReply(Prompt::Timezone.text().to_string()),
                ])
            }
            Button::Category(category) => {
                let mut out = vec![Reply::Plain(category_description(category).to_string())];
                if category == Category::SpecificProposals {
                    out.push(self.watch_list(chat).await?);
                }
                out.push(self.enter(chat, MenuState::Calendar(category)).await?);
                Ok(out)
            }
            Button::ToggleDay(day) => {
                let MenuState::Calendar(category) = self.state(chat).await? else {
                    tracing::warn!(chat = chat.0, "weekday toggle outside a calendar menu");
                    return Ok(vec![self.enter(chat, MenuState::Main).await?]);
                };
                let pref = self.store.preference(chat, category).await?;
                self.store
                    .set_preference(
                        chat,
                        category,
                        PreferenceUpdate::Weekday(day, !pref.is_enabled_on(day)),
                    )
                    .await?;
                Ok(vec![self.show_current(chat).await?])
            }
            Button::DeliveryTime => Ok(vec![Reply::ForceReply(
                Prompt::DigestTime.text().to_string(),
            )]),
            Button::AddProposal => Ok(vec![Reply::ForceReply(
                Prompt::AddProposal.text().to_string(),
            )]),
            Button::RemoveProposal => Ok(vec![Reply::ForceReply(
                Prompt::RemoveProposal.text().to_string(),
            )]),
        }
    }

    /// On-demand query; `None` while the chat is cooling down.
    async fn query(&self, chat: ChatId, button: Button, now: DateTime<Utc>) -> Option<Reply> {
        if !self.cooldown.try_acquire(chat) {
            tracing::debug!(chat = chat.0, "action throttled");
            return None;
        }

        let text = match self.query_text(button, now).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(chat = chat.0, error = %e, "on-demand query failed");
                return Some(Reply::Plain(UNAVAILABLE.to_string()));
            }
        };
        Some(Reply::Markdown(truncate_message(&text, self.message_limit)))
    }

    async fn query_text(&self, button: Button, now: DateTime<Utc>) -> Result<String> {
        let r = self.renderer();
        Ok(match button {
            Button::Informal => r.active_view(
                Phase::Informal,
                &self.engine.active_votes(Phase::Informal).await?,
            ),
            Button::Formal => {
                r.active_view(Phase::Formal, &self.engine.active_votes(Phase::Formal).await?)
            }
            Button::Completed => r.completed_view(&self.engine.completed_votes().await?),
            Button::Digest => Renderer::titled("Digest", &self.engine.digest(now).await?),
            _ => Renderer::titled(
                "Discussions",
                &self.engine.discussions_text(now).await?,
            ),
        })
    }

    async fn answer(&self, chat: ChatId, prompt: Prompt, text: &str) -> Result<Vec<Reply>> {
        let state = self.state(chat).await?;
        if state != prompt.expected_state() {
            tracing::warn!(chat = chat.0, ?prompt, menu = state.as_str(), "reply out of context");
            return Ok(vec![self.show_current(chat).await?]);
        }

        let mut out = Vec::new();
        match self.apply_answer(chat, prompt, text).await {
            Ok(Some(reply)) => out.push(reply),
            Ok(None) => {}
            Err(Error::Validation(msg)) => out.push(Reply::Plain(msg)),
            Err(e) => return Err(e),
        }
        out.push(self.show_current(chat).await?);
        Ok(out)
    }

    async fn apply_answer(&self, chat: ChatId, prompt: Prompt, text: &str) -> Result<Option<Reply>> {
        match prompt {
            Prompt::DigestTime => {
                let at = parse_delivery_time(text)?;
                self.store
                    .set_preference(chat, Category::Digest, PreferenceUpdate::DeliveryTime(at))
                    .await?;
                Ok(None)
            }
            Prompt::Timezone => {
                let offset = parse_timezone_offset(text)?;
                self.store
                    .set_preference(chat, Category::General, PreferenceUpdate::Timezone(offset))
                    .await?;
                Ok(Some(Reply::Plain(format!("Timezone offset set to {offset:+}"))))
            }
            Prompt::ProposalLookup => {
                let id = parse_proposal_id(text)?;
                match self.engine.proposal(id).await {
                    Ok(Some(p)) => Ok(Some(Reply::Markdown(truncate_message(
                        &self.renderer().proposal_view(id, &p),
                        self.message_limit,
                    )))),
                    Ok(None) => Err(Error::Validation(format!("Proposal #{id} was not found."))),
                    Err(e) => {
                        tracing::warn!(proposal = id, error = %e, "proposal lookup failed");
                        Err(Error::Validation(format!("Proposal #{id} was not found.")))
                    }
                }
            }
            Prompt::AddProposal => {
                let id = parse_proposal_id(text)?;
                if !self.store.watch_proposal(chat, id).await? {
                    return Err(Error::Validation(format!("You already follow proposal #{id}.")));
                }
                Ok(Some(self.watch_list(chat).await?))
            }
            Prompt::RemoveProposal => {
                let id = parse_proposal_id(text)?;
                if !self.store.unwatch_proposal(chat, id).await? {
                    return Err(Error::Validation(format!("You don't follow proposal #{id}.")));
                }
                Ok(Some(self.watch_list(chat).await?))
            }
        }
    }

    async fn watch_list(&self, chat: ChatId) -> Result<Reply> {
        let ids = self.store.watched_proposals(chat).await?;
        Ok(if ids.is_empty() {
            Reply::Plain("You don't follow any proposals yet.".to_string())
        } else {
            Reply::Markdown(self.renderer().watch_list(&ids))
        })
    }

    async fn enter(&self, chat: ChatId, state: MenuState) -> Result<Reply> {
        self.store.set_menu(chat, state).await?;
        self.render_state(chat, state).await
    }

    async fn show_current(&self, chat: ChatId) -> Result<Reply> {
        let state = self.state(chat).await?;
        self.enter(chat, state).await
    }

    async fn render_state(&self, chat: ChatId, state: MenuState) -> Result<Reply> {
        Ok(match state {
            MenuState::Main => Reply::Keyboard {
                text: "Choose an action:".to_string(),
                keyboard: main_keyboard(),
            },
            MenuState::Settings => Reply::Keyboard {
                text: "Choose which notifications to set up:".to_string(),
                keyboard: settings_keyboard(),
            },
            MenuState::Calendar(category) => {
                let pref = self.store.preference(chat, category).await?;
                let mut text = format!("Select weekdays for {}:", category.title());
                if category == Category::Digest {
                    text.push_str(&format!(
                        "\nDelivery time: {}",
                        pref.delivery_time.format("%H:%M")
                    ));
                }
                Reply::Keyboard {
                    text,
                    keyboard: calendar_keyboard(category, &pref.weekdays),
                }
            }
        })
    }
}

pub fn main_keyboard() -> ReplyKeyboard {
    let labels = [
        Button::Informal,
        Button::Formal,
        Button::Completed,
        Button::Digest,
        Button::Discussions,
        Button::ProposalLookup,
        Button::Settings,
    ]
    .into_iter()
    .map(Button::label)
    .collect();
    ReplyKeyboard::with_columns(labels, MAIN_COLUMNS)
}

pub fn settings_keyboard() -> ReplyKeyboard {
    let mut buttons: Vec<Button> = Category::CALENDAR.into_iter().map(Button::Category).collect();
    buttons.extend([Button::Timezone, Button::MainMenu]);
    ReplyKeyboard::with_columns(buttons.into_iter().map(Button::label).collect(), MAIN_COLUMNS)
}

/// Weekday toggles, then the category's extra buttons, then navigation.
pub fn calendar_keyboard(category: Category, weekdays: &[bool; 7]) -> ReplyKeyboard {
    let mut labels: Vec<String> = WEEKDAYS
        .iter()
        .zip(weekdays.iter())
        .map(|(day, on)| day_label(*day, *on))
        .collect();
    let extra: &[Button] = match category {
        Category::Digest => &[Button::DeliveryTime],
        Category::SpecificProposals => &[Button::AddProposal, Button::RemoveProposal],
        _ => &[],
    };
    labels.extend(extra.iter().map(|b| b.label()));
    labels.extend([Button::Settings.label(), Button::MainMenu.label()]);
    ReplyKeyboard::with_columns(labels, CALENDAR_COLUMNS)
}

/// Reply for users who are not members of the broadcast chat.
pub fn access_denied() -> String {
    escape_markdown(
        "Sorry, you don't have access to this bot. Please make sure you are a member of the bot's channel.",
    )
}
