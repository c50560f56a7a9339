//! Issue form: ordered fields, Submit/Cancel buttons, autofill on Parent and Dependencies.

use ratatui::crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use tui_textarea::{CursorMove, Input, TextArea};

use crate::issue::{split_list, Issue, IssueDraft, IssueType, Priority, Status};

use super::autofill::{self, AutofillSources, AutofillState, AutofillTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldId {
    Title,
    Type,
    Priority,
    Description,
    Labels,
    Parent,
    Dependencies,
    Points,
    Acceptance,
    Minor,
    Status,
}

impl FieldId {
    pub fn title(self) -> &'static str {
        match self {
            FieldId::Title => "Title",
            FieldId::Type => "Type",
            FieldId::Priority => "Priority",
            FieldId::Description => "Description",
            FieldId::Labels => "Labels",
            FieldId::Parent => "Parent epic",
            FieldId::Dependencies => "Dependencies",
            FieldId::Points => "Points",
            FieldId::Acceptance => "Acceptance criteria",
            FieldId::Minor => "Minor",
            FieldId::Status => "Status",
        }
    }

    pub fn is_multiline(self) -> bool {
        matches!(self, FieldId::Description | FieldId::Acceptance)
    }

    fn autofill_target(self) -> Option<AutofillTarget> {
        match self {
            FieldId::Parent => Some(AutofillTarget::Parent),
            FieldId::Dependencies => Some(AutofillTarget::Dependencies),
            _ => None,
        }
    }
}

pub const BASIC_FIELDS: [FieldId; 5] = [
    FieldId::Title,
    FieldId::Type,
    FieldId::Priority,
    FieldId::Description,
    FieldId::Labels,
];

pub const EXTENDED_FIELDS: [FieldId; 6] = [
    FieldId::Parent,
    FieldId::Dependencies,
    FieldId::Points,
    FieldId::Acceptance,
    FieldId::Minor,
    FieldId::Status,
];

#[derive(Debug, Clone)]
pub enum FieldValue {
    Text(TextArea<'static>),
    Choice { options: Vec<&'static str>, index: usize },
    Toggle(bool),
}

#[derive(Debug, Clone)]
pub struct Field {
    pub id: FieldId,
    pub value: FieldValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit { issue_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormFocus {
    /// Index into the visible field list.
    Field(usize),
    Submit,
    Cancel,
}

/// What the form did with a key before the keymap saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormOutcome {
    Consumed,
    /// An action id for the dispatcher (`submit`, `cancel-form`).
    Action(&'static str),
    NotConsumed,
}

/// Everything needed to write the form back to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct FormSubmission {
    pub mode: FormMode,
    pub draft: IssueDraft,
    pub dependencies: Vec<String>,
    pub original_dependencies: Vec<String>,
}

fn text_area(text: &str) -> TextArea<'static> {
    let mut ta = if text.is_empty() {
        TextArea::default()
    } else {
        TextArea::from(text.lines().map(|l| l.to_string()))
    };
    ta.move_cursor(CursorMove::Bottom);
    ta.move_cursor(CursorMove::End);
    ta
}

fn choice(options: Vec<&'static str>, selected: &str) -> FieldValue {
    let index = options.iter().position(|o| *o == selected).unwrap_or(0);
    FieldValue::Choice { options, index }
}

#[derive(Debug, Clone)]
pub struct FormState {
    pub mode: FormMode,
    fields: Vec<Field>,
    pub extended: bool,
    pub focus: FormFocus,
    pub autofill: Option<AutofillState>,
    pub sources: AutofillSources,
    dismissed_query: Option<String>,
    original_dependencies: Vec<String>,
}

impl FormState {
    fn build(mode: FormMode, issue: &Issue, dependencies: Vec<String>) -> Self {
        let fields = vec![
            Field { id: FieldId::Title, value: FieldValue::Text(text_area(&issue.title)) },
            Field {
                id: FieldId::Type,
                value: choice(IssueType::ALL.iter().map(|t| t.as_str()).collect(), issue.issue_type.as_str()),
            },
            Field {
                id: FieldId::Priority,
                value: choice(Priority::ALL.iter().map(|p| p.as_str()).collect(), issue.priority.as_str()),
            },
            Field { id: FieldId::Description, value: FieldValue::Text(text_area(&issue.description)) },
            Field { id: FieldId::Labels, value: FieldValue::Text(text_area(&issue.labels.join(", "))) },
            Field {
                id: FieldId::Parent,
                value: FieldValue::Text(text_area(issue.parent_id.as_deref().unwrap_or(""))),
            },
            Field { id: FieldId::Dependencies, value: FieldValue::Text(text_area(&dependencies.join(", "))) },
            Field {
                id: FieldId::Points,
                value: FieldValue::Text(text_area(&if issue.points > 0 { issue.points.to_string() } else { String::new() })),
            },
            Field { id: FieldId::Acceptance, value: FieldValue::Text(text_area(&issue.acceptance)) },
            Field { id: FieldId::Minor, value: FieldValue::Toggle(issue.minor) },
            Field {
                id: FieldId::Status,
                value: choice(Status::ALL.iter().map(|s| s.as_str()).collect(), issue.status.as_str()),
            },
        ];
        // Extended fields start visible when editing an issue that uses them.
        let extended = matches!(mode, FormMode::Edit { .. })
            && (issue.parent_id.is_some() || !dependencies.is_empty() || issue.points > 0 || !issue.acceptance.is_empty());
        Self {
            mode,
            fields,
            extended,
            focus: FormFocus::Field(0),
            autofill: None,
            sources: AutofillSources::default(),
            dismissed_query: None,
            original_dependencies: dependencies,
        }
    }

    /// A blank form, optionally pre-filled with a parent epic.
    pub fn create(parent_id: Option<&str>) -> Self {
        let mut blank = Issue::new("", "");
        blank.parent_id = parent_id.map(|p| p.to_string());
        let mut form = Self::build(FormMode::Create, &blank, Vec::new());
        form.extended = parent_id.is_some();
        form
    }

    pub fn edit(issue: &Issue, dependencies: Vec<String>) -> Self {
        Self::build(FormMode::Edit { issue_id: issue.id.clone() }, issue, dependencies)
    }

    pub fn heading(&self) -> String {
        match &self.mode {
            FormMode::Create => " New issue ".to_string(),
            FormMode::Edit { issue_id } => format!(" Edit {} ", issue_id),
        }
    }

    pub fn visible_fields(&self) -> Vec<FieldId> {
        let mut out = BASIC_FIELDS.to_vec();
        if self.extended {
            out.extend(EXTENDED_FIELDS);
        }
        out
    }

    pub fn focused_field(&self) -> Option<FieldId> {
        match self.focus {
            FormFocus::Field(i) => self.visible_fields().get(i).copied(),
            _ => None,
        }
    }

    pub fn focus_field(&mut self, id: FieldId) {
        if let Some(i) = self.visible_fields().iter().position(|f| *f == id) {
            self.focus = FormFocus::Field(i);
        }
    }

    fn field(&self, id: FieldId) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == id)
    }

    fn field_mut(&mut self, id: FieldId) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.id == id)
    }

    pub fn value(&self, id: FieldId) -> String {
        match self.field(id).map(|f| &f.value) {
            Some(FieldValue::Text(ta)) => ta.lines().join("\n"),
            Some(FieldValue::Choice { options, index }) => options.get(*index).unwrap_or(&"").to_string(),
            Some(FieldValue::Toggle(on)) => on.to_string(),
            None => String::new(),
        }
    }

    pub fn set_value(&mut self, id: FieldId, value: &str) {
        if let Some(field) = self.field_mut(id) {
            match &mut field.value {
                FieldValue::Text(ta) => *ta = text_area(value),
                FieldValue::Choice { options, index } => {
                    if let Some(i) = options.iter().position(|o| o.eq_ignore_ascii_case(value)) {
                        *index = i;
                    }
                }
                FieldValue::Toggle(on) => *on = matches!(value, "true" | "yes" | "y" | "1"),
            }
        }
    }

    pub fn toggle_extended(&mut self) {
        self.extended = !self.extended;
        let len = self.visible_fields().len();
        if let FormFocus::Field(i) = self.focus {
            if i >= len {
                self.focus = FormFocus::Field(len - 1);
            }
        }
        self.autofill = None;
        self.refresh_autofill();
    }

    pub fn next_focus(&mut self) {
        let len = self.visible_fields().len();
        self.focus = match self.focus {
            FormFocus::Field(i) if i + 1 < len => FormFocus::Field(i + 1),
            FormFocus::Field(_) => FormFocus::Submit,
            FormFocus::Submit => FormFocus::Cancel,
            FormFocus::Cancel => FormFocus::Field(0),
        };
        self.autofill = None;
        self.dismissed_query = None;
        self.refresh_autofill();
    }

    pub fn prev_focus(&mut self) {
        let len = self.visible_fields().len();
        self.focus = match self.focus {
            FormFocus::Field(0) => FormFocus::Cancel,
            FormFocus::Field(i) => FormFocus::Field(i - 1),
            FormFocus::Submit => FormFocus::Field(len - 1),
            FormFocus::Cancel => FormFocus::Submit,
        };
        self.autofill = None;
        self.dismissed_query = None;
        self.refresh_autofill();
    }

    /// Keys the form owns before the keymap sees them.
    pub fn handle_key(&mut self, key: &KeyEvent) -> FormOutcome {
        if let Some(af) = self.autofill.as_mut() {
            let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
            match key.code {
                KeyCode::Down => {
                    af.select_next();
                    return FormOutcome::Consumed;
                }
                KeyCode::Char('n') if ctrl => {
                    af.select_next();
                    return FormOutcome::Consumed;
                }
                KeyCode::Up => {
                    af.select_prev();
                    return FormOutcome::Consumed;
                }
                KeyCode::Char('p') if ctrl => {
                    af.select_prev();
                    return FormOutcome::Consumed;
                }
                KeyCode::Enter => {
                    self.accept_autofill();
                    return FormOutcome::Consumed;
                }
                KeyCode::Esc => {
                    self.dismissed_query = Some(af.query.clone());
                    self.autofill = None;
                    return FormOutcome::Consumed;
                }
                _ => {}
            }
        }

        match (self.focus, key.code) {
            (FormFocus::Submit, KeyCode::Enter) => FormOutcome::Action("submit"),
            (FormFocus::Cancel, KeyCode::Enter) => FormOutcome::Action("cancel-form"),
            (FormFocus::Submit, KeyCode::Left | KeyCode::Right) => {
                self.focus = FormFocus::Cancel;
                FormOutcome::Consumed
            }
            (FormFocus::Cancel, KeyCode::Left | KeyCode::Right) => {
                self.focus = FormFocus::Submit;
                FormOutcome::Consumed
            }
            (FormFocus::Field(i), KeyCode::Enter) => {
                let fields = self.visible_fields();
                match fields.get(i) {
                    Some(f) if f.is_multiline() => FormOutcome::NotConsumed,
                    // Enter on the last field completes the form.
                    Some(_) if i + 1 == fields.len() => FormOutcome::Action("submit"),
                    Some(_) => {
                        self.next_focus();
                        FormOutcome::Consumed
                    }
                    None => FormOutcome::NotConsumed,
                }
            }
            _ => FormOutcome::NotConsumed,
        }
    }

    /// Feed a key the keymap did not claim into the focused field.
    pub fn input(&mut self, key: &KeyEvent) {
        let Some(id) = self.focused_field() else {
            return;
        };
        let Some(field) = self.field_mut(id) else {
            return;
        };
        match &mut field.value {
            FieldValue::Text(ta) => {
                if key.code == KeyCode::Enter && !id.is_multiline() {
                    return;
                }
                ta.input(Input::from(Event::Key(*key)));
            }
            FieldValue::Choice { options, index } => {
                let n = options.len().max(1);
                match key.code {
                    KeyCode::Right | KeyCode::Char(' ') | KeyCode::Char('l') => *index = (*index + 1) % n,
                    KeyCode::Left | KeyCode::Char('h') => *index = (*index + n - 1) % n,
                    _ => {}
                }
            }
            FieldValue::Toggle(on) => match key.code {
                KeyCode::Char(' ') | KeyCode::Left | KeyCode::Right => *on = !*on,
                KeyCode::Char('y') => *on = true,
                KeyCode::Char('n') => *on = false,
                _ => {}
            },
        }
        self.refresh_autofill();
    }

    /// Re-evaluate the dropdown for the focused field.
    pub fn refresh_autofill(&mut self) {
        let target = self.focused_field().and_then(|f| f.autofill_target());
        let Some(target) = target else {
            self.autofill = None;
            return;
        };
        let field = match target {
            AutofillTarget::Parent => FieldId::Parent,
            AutofillTarget::Dependencies => FieldId::Dependencies,
        };
        let text = self.value(field);
        let query = autofill::query_for(target, &text).to_string();
        if self.dismissed_query.as_deref().is_some_and(|d| d != query) {
            self.dismissed_query = None;
        }
        self.autofill = autofill::refresh(
            self.autofill.as_ref(),
            target,
            &text,
            &self.sources,
            self.dismissed_query.as_deref(),
        );
    }

    pub fn set_sources(&mut self, sources: AutofillSources) {
        self.sources = sources;
        self.refresh_autofill();
    }

    pub fn accept_autofill(&mut self) {
        let Some(af) = self.autofill.take() else {
            return;
        };
        let Some(item) = af.selected_item() else {
            return;
        };
        let field = match af.target {
            AutofillTarget::Parent => FieldId::Parent,
            AutofillTarget::Dependencies => FieldId::Dependencies,
        };
        let text = autofill::accept(af.target, &self.value(field), &item.id);
        self.set_value(field, &text);
        self.focus_field(field);
        self.refresh_autofill();
    }

    /// Field the external editor opens: the focused multi-line field, else Description.
    pub fn editor_target(&self) -> FieldId {
        match self.focused_field() {
            Some(f) if f.is_multiline() => f,
            _ => FieldId::Description,
        }
    }

    pub fn submission(&self) -> Result<FormSubmission, String> {
        let title = self.value(FieldId::Title).trim().to_string();
        if title.is_empty() {
            return Err("Title is required".to_string());
        }
        let points_text = self.value(FieldId::Points);
        let points = if points_text.trim().is_empty() {
            0
        } else {
            points_text
                .trim()
                .parse::<u32>()
                .map_err(|_| format!("Points must be a number, got '{}'", points_text.trim()))?
        };
        let parent = self.value(FieldId::Parent).trim().to_string();
        let draft = IssueDraft {
            title,
            description: self.value(FieldId::Description),
            issue_type: IssueType::parse(&self.value(FieldId::Type)),
            priority: Priority::parse(&self.value(FieldId::Priority)),
            points,
            labels: split_list(&self.value(FieldId::Labels)),
            parent_id: (!parent.is_empty()).then_some(parent),
            acceptance: self.value(FieldId::Acceptance),
            minor: self.value(FieldId::Minor) == "true",
            status: match self.mode {
                FormMode::Create => None,
                FormMode::Edit { .. } => Status::parse(&self.value(FieldId::Status)),
            },
        };
        Ok(FormSubmission {
            mode: self.mode.clone(),
            draft,
            dependencies: split_list(&self.value(FieldId::Dependencies)),
            original_dependencies: self.original_dependencies.clone(),
        })
    }

    /// The form body as styled lines, without the dropdown.
    pub fn render_lines(&self) -> Vec<Line<'static>> {
        let mut lines: Vec<Line<'static>> = Vec::new();
        let focused = self.focused_field();
        for id in self.visible_fields() {
            let Some(field) = self.field(id) else {
                continue;
            };
            let is_focused = focused == Some(id);
            let label_style = if is_focused {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Rgb(140, 140, 140))
            };
            let marker = if is_focused { "▸ " } else { "  " };
            lines.push(Line::from(Span::styled(format!("{}{}", marker, id.title()), label_style)));
            match &field.value {
                FieldValue::Text(ta) => {
                    let (row, col) = ta.cursor();
                    for (i, text) in ta.lines().iter().enumerate() {
                        lines.push(text_line(text, (is_focused && i == row).then_some(col)));
                    }
                }
                FieldValue::Choice { options, index } => {
                    let value = options.get(*index).copied().unwrap_or("");
                    let style = if is_focused {
                        Style::default().fg(Color::Yellow)
                    } else {
                        Style::default()
                    };
                    lines.push(Line::from(vec![
                        Span::raw("    "),
                        Span::styled(format!("◂ {} ▸", value), style),
                    ]));
                }
                FieldValue::Toggle(on) => {
                    let mark = if *on { "[x]" } else { "[ ]" };
                    lines.push(Line::from(format!("    {}", mark)));
                }
            }
            lines.push(Line::from(""));
        }

        let button = |label: &str, active: bool| {
            let style = if active {
                Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Rgb(140, 140, 140))
            };
            Span::styled(format!("[ {} ]", label), style)
        };
        lines.push(Line::from(vec![
            Span::raw("  "),
            button("Submit", self.focus == FormFocus::Submit),
            Span::raw("  "),
            button("Cancel", self.focus == FormFocus::Cancel),
        ]));
        let toggle_hint = if self.extended { "fewer fields" } else { "more fields" };
        lines.push(Line::from(Span::styled(
            format!("  ctrl+s submit · ctrl+x {} · ctrl+o $EDITOR · esc cancel", toggle_hint),
            Style::default().fg(Color::DarkGray),
        )));
        lines
    }

    /// Body lines with the autofill dropdown spliced in above the next field.
    pub fn render_with_dropdown(&self) -> Vec<Line<'static>> {
        let lines = self.render_lines();
        let Some(af) = &self.autofill else {
            return lines;
        };
        let fields = self.visible_fields();
        let next_title = self
            .focused_field()
            .and_then(|f| fields.iter().position(|x| *x == f))
            .and_then(|i| fields.get(i + 1))
            .map(|f| f.title());
        let start = self
            .focused_field()
            .and_then(|f| lines.iter().position(|l| plain_text(l).ends_with(f.title())))
            .map(|i| i + 1)
            .unwrap_or(0);
        splice_dropdown(lines, next_title, start, dropdown_lines(af))
    }
}

fn text_line(text: &str, cursor_col: Option<usize>) -> Line<'static> {
    let mut spans = vec![Span::raw("    ")];
    match cursor_col {
        Some(col) => {
            let chars: Vec<char> = text.chars().collect();
            let before: String = chars.iter().take(col).collect();
            let at: String = chars.get(col).map(|c| c.to_string()).unwrap_or_else(|| " ".to_string());
            let after: String = chars.iter().skip(col + 1).collect();
            spans.push(Span::raw(before));
            spans.push(Span::styled(at, Style::default().add_modifier(Modifier::REVERSED)));
            spans.push(Span::raw(after));
        }
        None => spans.push(Span::raw(text.to_string())),
    }
    Line::from(spans)
}

pub fn plain_text(line: &Line<'_>) -> String {
    line.spans.iter().map(|s| s.content.as_ref()).collect()
}

fn dropdown_lines(af: &AutofillState) -> Vec<Line<'static>> {
    let border = Style::default().fg(Color::DarkGray);
    let mut out = Vec::with_capacity(af.items.len());
    for (i, scored) in af.items.iter().enumerate() {
        let selected = i == af.selected;
        let base = if selected {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default()
        };
        let mut spans = vec![
            Span::styled("    │ ".to_string(), border),
            Span::styled(format!("{:<12} ", scored.item.id), base.fg(if selected { Color::Black } else { Color::Yellow })),
        ];
        for (ci, ch) in scored.item.title.chars().enumerate() {
            let style = if scored.title_indices.contains(&ci) {
                base.add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
            } else {
                base
            };
            spans.push(Span::styled(ch.to_string(), style));
        }
        out.push(Line::from(spans));
    }
    out
}

/// Insert `dropdown` above the first line at or after `start` containing `marker`; append when absent.
pub fn splice_dropdown(
    mut lines: Vec<Line<'static>>,
    marker: Option<&str>,
    start: usize,
    dropdown: Vec<Line<'static>>,
) -> Vec<Line<'static>> {
    let at = marker.and_then(|m| {
        lines
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, l)| plain_text(l).contains(m))
            .map(|(i, _)| i)
    });
    match at {
        Some(i) => {
            let tail = lines.split_off(i);
            lines.extend(dropdown);
            lines.extend(tail);
        }
        None => lines.extend(dropdown),
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::autofill::AutofillItem;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(form: &mut FormState, s: &str) {
        for c in s.chars() {
            form.input(&key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn tab_walks_fields_then_buttons() {
        let mut f = FormState::create(None);
        for _ in 0..BASIC_FIELDS.len() - 1 {
            f.next_focus();
        }
        assert_eq!(f.focused_field(), Some(FieldId::Labels));
        f.next_focus();
        assert_eq!(f.focus, FormFocus::Submit);
        f.next_focus();
        assert_eq!(f.focus, FormFocus::Cancel);
        f.next_focus();
        assert_eq!(f.focus, FormFocus::Field(0));
        f.prev_focus();
        assert_eq!(f.focus, FormFocus::Cancel);
    }

    #[test]
    fn toggling_extended_twice_restores_fields() {
        let mut f = FormState::create(None);
        let before = f.visible_fields();
        f.toggle_extended();
        assert_eq!(f.visible_fields().len(), BASIC_FIELDS.len() + EXTENDED_FIELDS.len());
        f.toggle_extended();
        assert_eq!(f.visible_fields(), before);
    }

    #[test]
    fn enter_advances_single_line_and_submits_on_last() {
        let mut f = FormState::create(None);
        assert_eq!(f.handle_key(&key(KeyCode::Enter)), FormOutcome::Consumed);
        assert_eq!(f.focused_field(), Some(FieldId::Type));
        f.focus_field(FieldId::Description);
        assert_eq!(f.handle_key(&key(KeyCode::Enter)), FormOutcome::NotConsumed);
        f.focus_field(FieldId::Labels);
        assert_eq!(f.handle_key(&key(KeyCode::Enter)), FormOutcome::Action("submit"));
        f.focus = FormFocus::Cancel;
        assert_eq!(f.handle_key(&key(KeyCode::Enter)), FormOutcome::Action("cancel-form"));
    }

    #[test]
    fn typing_reaches_the_focused_text_field() {
        let mut f = FormState::create(None);
        type_str(&mut f, "Fix cache");
        assert_eq!(f.value(FieldId::Title), "Fix cache");
        f.focus_field(FieldId::Priority);
        f.input(&key(KeyCode::Right));
        assert_eq!(f.value(FieldId::Priority), "P3");
    }

    #[test]
    fn empty_title_is_rejected() {
        let f = FormState::create(None);
        assert_eq!(f.submission().unwrap_err(), "Title is required");
    }

    #[test]
    fn dependency_autofill_end_to_end() {
        let mut f = FormState::create(None);
        f.toggle_extended();
        f.set_sources(AutofillSources {
            epics: vec![],
            open_issues: vec![
                AutofillItem::new("td-a", "Parser"),
                AutofillItem::new("td-b", "Cache eviction"),
                AutofillItem::new("td-cache-42", "Cache warmup"),
            ],
        });
        f.focus_field(FieldId::Dependencies);
        f.set_value(FieldId::Dependencies, "td-a, td-b, ");
        type_str(&mut f, "cach");
        let af = f.autofill.as_ref().unwrap();
        assert_eq!(af.items[0].item.id, "td-cache-42");

        assert_eq!(f.handle_key(&key(KeyCode::Enter)), FormOutcome::Consumed);
        assert_eq!(f.value(FieldId::Dependencies), "td-a, td-b, td-cache-42, ");
        assert_eq!(f.focused_field(), Some(FieldId::Dependencies));
        assert!(f.autofill.is_none());
    }

    #[test]
    fn dropdown_is_spliced_above_next_field() {
        let mut f = FormState::create(None);
        f.toggle_extended();
        f.set_sources(AutofillSources {
            epics: vec![AutofillItem::new("td-e1", "Storage rewrite")],
            open_issues: vec![],
        });
        f.focus_field(FieldId::Parent);
        type_str(&mut f, "stor");
        assert!(f.autofill.is_some());
        let lines = f.render_with_dropdown();
        let texts: Vec<String> = lines.iter().map(plain_text).collect();
        let dropdown = texts.iter().position(|t| t.contains("td-e1")).unwrap();
        let next = texts.iter().position(|t| t.contains("Dependencies")).unwrap();
        assert!(dropdown < next);
        assert!(texts[..dropdown].iter().any(|t| t.contains("Parent epic")));
    }

    #[test]
    fn splice_appends_when_marker_missing() {
        let lines = vec![Line::from("a"), Line::from("b")];
        let out = splice_dropdown(lines, Some("zzz"), 0, vec![Line::from("drop")]);
        assert_eq!(plain_text(&out[2]), "drop");
    }

    #[test]
    fn edit_form_reports_dependency_changes() {
        let mut issue = Issue::new("td-0001", "Existing");
        issue.points = 3;
        let mut f = FormState::edit(&issue, vec!["td-a".into()]);
        assert!(f.extended);
        f.set_value(FieldId::Dependencies, "td-b");
        let sub = f.submission().unwrap();
        assert_eq!(sub.original_dependencies, vec!["td-a"]);
        assert_eq!(sub.dependencies, vec!["td-b"]);
        assert_eq!(sub.draft.points, 3);
        assert_eq!(sub.mode, FormMode::Edit { issue_id: "td-0001".into() });
    }
}
