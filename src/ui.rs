use crate::client::AppSnapshot;
use color_eyre::eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use ethers::types::{Address, H256};
use rand::Rng;
use rand::seq::SliceRandom;
use ranger_arcade::{
    executor::TxStatus,
    gateway::{ActionRequest, BetConstraint, GameKind, SwapDirection},
    history::GameRecord,
    surface::{ActionSurface, Severity},
};
use ratatui::prelude::*;
use ratatui::widgets::*;
use std::io::stdout;
use tokio::sync::mpsc;
use tracing::error;
use unicode_width::UnicodeWidthStr;

pub type InputReceiver = mpsc::UnboundedReceiver<KeyEvent>;

const REEL_SYMBOLS: [&str; 6] = ["7", "BAR", "CHERRY", "BELL", "LEMON", "STAR"];

pub enum UserEvent {
    Quit,
    Connect,
    Disconnect,
    SwitchNetwork,
    Refresh,
    Submit(ActionRequest),
    CancelWait,
    Redraw,
}

#[derive(Debug)]
pub struct UiState {
    mode: Mode,
    slot_presets: Vec<String>,
    reels: Option<(H256, [&'static str; 3])>,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

impl Default for UiState {
    fn default() -> Self {
        UiState {
            mode: Mode::Normal,
            slot_presets: Vec::new(),
            reels: None,
            terminal: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
enum Mode {
    #[default]
    Normal,
    FlipModal(AmountState),
    SlotsModal(PresetState),
    SwapModal(SwapState),
    LiquidityModal(LiquidityState),
    QuitModal,
}

#[derive(Clone, Debug, Default)]
struct AmountState { input: String }

#[derive(Clone, Debug, Default)]
struct PresetState { idx: usize }

#[derive(Clone, Debug)]
struct SwapState { direction: SwapDirection, input: String }

impl Default for SwapState { fn default() -> Self { SwapState { direction: SwapDirection::MintMeToRanger, input: String::new() } } }

#[derive(Clone, Debug, Default)]
struct LiquidityState { token: String, native: String, native_focused: bool }

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;
    // One persistent Terminal keeps buffers across draws
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::event::DisableMouseCapture,
        crossterm::terminal::LeaveAlternateScreen
    )?;
    Ok(())
}

/// Reads key presses on a dedicated thread so the event loop never blocks on the terminal.
pub fn spawn_input_reader() -> InputReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || loop {
        match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                if tx.send(key).is_err() { break; }
            }
            Ok(_) => {}
            Err(err) => {
                error!(error = %err, "terminal input failed");
                break;
            }
        }
    });
    rx
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    state.slot_presets = slot_presets(snap);
    // reels only change when a new spin settles
    if let Some(play) = snap.last_play.as_ref().filter(|p| p.game == GameKind::Slots) {
        if state.reels.map(|(hash, _)| hash) != Some(play.tx_hash) {
            state.reels = Some((play.tx_hash, reels_for(play.won, &mut rand::rng())));
        }
    }
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

pub fn handle_key(state: &mut UiState, snap: &AppSnapshot, k: KeyEvent) -> Option<UserEvent> {
    match &mut state.mode {
        Mode::FlipModal(fs) => {
            match k.code {
                KeyCode::Esc => { state.mode = Mode::Normal; return Some(UserEvent::Redraw); }
                KeyCode::Enter => {
                    let amount = std::mem::take(&mut fs.input);
                    state.mode = Mode::Normal;
                    return Some(UserEvent::Submit(ActionRequest::Play { amount }));
                }
                code => { edit_amount(&mut fs.input, code); return Some(UserEvent::Redraw); }
            }
        }
        Mode::SlotsModal(ps) => {
            match k.code {
                KeyCode::Esc => { state.mode = Mode::Normal; return Some(UserEvent::Redraw); }
                KeyCode::Left | KeyCode::Up => { ps.idx = ps.idx.saturating_sub(1); return Some(UserEvent::Redraw); }
                KeyCode::Right | KeyCode::Down => { let max = state.slot_presets.len().saturating_sub(1); ps.idx = (ps.idx + 1).min(max); return Some(UserEvent::Redraw); }
                KeyCode::Enter => {
                    let Some(amount) = state.slot_presets.get(ps.idx).cloned() else { return Some(UserEvent::Redraw); };
                    state.mode = Mode::Normal;
                    return Some(UserEvent::Submit(ActionRequest::Spin { amount }));
                }
                _ => return None,
            }
        }
        Mode::SwapModal(ss) => {
            match k.code {
                KeyCode::Esc => { state.mode = Mode::Normal; return Some(UserEvent::Redraw); }
                KeyCode::Tab => {
                    ss.direction = match ss.direction {
                        SwapDirection::MintMeToRanger => SwapDirection::RangerToMintMe,
                        SwapDirection::RangerToMintMe => SwapDirection::MintMeToRanger,
                    };
                    return Some(UserEvent::Redraw);
                }
                KeyCode::Enter => {
                    let request = ActionRequest::Swap { direction: ss.direction, amount: std::mem::take(&mut ss.input) };
                    state.mode = Mode::Normal;
                    return Some(UserEvent::Submit(request));
                }
                code => { edit_amount(&mut ss.input, code); return Some(UserEvent::Redraw); }
            }
        }
        Mode::LiquidityModal(ls) => {
            match k.code {
                KeyCode::Esc => { state.mode = Mode::Normal; return Some(UserEvent::Redraw); }
                KeyCode::Tab => { ls.native_focused = !ls.native_focused; return Some(UserEvent::Redraw); }
                KeyCode::Enter => {
                    let request = ActionRequest::AddLiquidity {
                        token_amount: std::mem::take(&mut ls.token),
                        native_amount: std::mem::take(&mut ls.native),
                    };
                    state.mode = Mode::Normal;
                    return Some(UserEvent::Submit(request));
                }
                code => {
                    let field = if ls.native_focused { &mut ls.native } else { &mut ls.token };
                    edit_amount(field, code);
                    return Some(UserEvent::Redraw);
                }
            }
        }
        Mode::QuitModal => {
            match k.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => return Some(UserEvent::Quit),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => { state.mode = Mode::Normal; return Some(UserEvent::Redraw); }
                _ => return None,
            }
        }
        Mode::Normal => {}
    }
    Some(match k.code {
        KeyCode::Char('q') | KeyCode::Esc => { state.mode = Mode::QuitModal; UserEvent::Redraw }
        KeyCode::Char('c') => UserEvent::Connect,
        KeyCode::Char('d') => UserEvent::Disconnect,
        KeyCode::Char('n') => UserEvent::SwitchNetwork,
        KeyCode::Char('r') => UserEvent::Refresh,
        KeyCode::Char('x') => UserEvent::CancelWait,
        KeyCode::Char('f') => { state.mode = Mode::FlipModal(AmountState::default()); UserEvent::Redraw }
        KeyCode::Char('s') => {
            state.slot_presets = slot_presets(snap);
            state.mode = Mode::SlotsModal(PresetState::default());
            UserEvent::Redraw
        }
        KeyCode::Char('w') => { state.mode = Mode::SwapModal(SwapState::default()); UserEvent::Redraw }
        KeyCode::Char('l') => { state.mode = Mode::LiquidityModal(LiquidityState::default()); UserEvent::Redraw }
        _ => return None,
    })
}

fn edit_amount(input: &mut String, code: KeyCode) {
    match code {
        KeyCode::Backspace => { input.pop(); }
        KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => input.push(c),
        _ => {}
    }
}

fn slot_presets(snap: &AppSnapshot) -> Vec<String> {
    match snap.constraints.as_ref().map(|c| &c.slots) {
        Some(BetConstraint::Presets { amounts }) => amounts.iter().map(|a| a.to_decimal_string()).collect(),
        Some(BetConstraint::Range { .. }) | None => Vec::new(),
    }
}

/// Reel faces for a settled spin. Only the contract's `won` flag decides them.
pub fn reels_for<R: Rng + ?Sized>(won: bool, rng: &mut R) -> [&'static str; 3] {
    if won {
        let face = REEL_SYMBOLS[rng.random_range(0..REEL_SYMBOLS.len())];
        return [face; 3];
    }
    let mut faces = REEL_SYMBOLS;
    faces.shuffle(rng);
    [faces[0], faces[1], faces[2]]
}

pub fn short_address(address: &Address) -> String {
    let full = format!("{address:#x}");
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),  // header
            Constraint::Length(3),  // notification
            Constraint::Min(14),    // games + swap
            Constraint::Length(6),  // errors
            Constraint::Length(3),  // help
        ])
        .split(f.area());

    draw_top(f, chunks[0], snap);
    draw_notification(f, chunks[1], snap);
    draw_games(f, state, chunks[2], snap);
    draw_errors(f, chunks[3], snap);
    draw_help(f, chunks[4]);
    draw_modals(f, state, snap);
}

fn draw_top(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let account = snap.account.as_ref().map(short_address).unwrap_or_else(|| String::from("not connected"));
    let network = match snap.chain_id {
        Some(id) if id == snap.required_chain_id => Span::raw(format!("{} ({id:#x})", snap.network_name)),
        Some(id) => Span::styled(format!("wrong network ({id:#x}), press n"), Style::default().fg(Color::Red)),
        None => Span::styled("-", Style::default().fg(Color::DarkGray)),
    };
    let native = snap.balances.native.map(|b| b.to_fixed_string(3)).unwrap_or_else(|| String::from("-"));
    let token = snap.balances.token.map(|b| b.to_fixed_string(3)).unwrap_or_else(|| String::from("-"));
    let lines = vec![
        Line::from(vec![
            Span::raw(format!("Account: {account} | Network: ")),
            network,
            Span::raw(format!(" | {}: {native} | {}: {token}", snap.native_symbol, snap.token_symbol)),
        ]),
        Line::from(snap.status.clone()),
    ];
    let top = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Ranger Arcade"));
    f.render_widget(top, area);
}

fn draw_notification(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let (text, color) = match &snap.notification {
        Some(n) => (n.message.clone(), severity_color(n.severity)),
        None => (String::from("Press c to connect a wallet."), Color::DarkGray),
    };
    let p = Paragraph::new(text)
        .style(Style::default().fg(color))
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(p, area);
}

fn draw_games(f: &mut Frame, state: &UiState, area: Rect, snap: &AppSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(35), Constraint::Percentage(30)])
        .split(area);

    // Coin flip
    let mut flip = Vec::new();
    if let Some(BetConstraint::Range { max }) = snap.constraints.as_ref().map(|c| &c.coin_flip) {
        flip.push(Line::from(format!("Max bet: {max} {}", snap.native_symbol)));
    }
    if let Some(play) = snap.last_play.as_ref().filter(|p| p.game == GameKind::CoinFlip) {
        let side = if play.won { "HEADS, you won" } else { "TAILS, you lost" };
        flip.push(Line::styled(side, Style::default().fg(if play.won { Color::Green } else { Color::Red })));
    }
    flip.push(Line::from(""));
    push_history(&mut flip, &snap.coin_flip_history, &snap.native_symbol);
    let title = surface_title("Coin Flip", ActionSurface::CoinFlip, snap);
    f.render_widget(Paragraph::new(flip).block(Block::default().borders(Borders::ALL).title(title)), cols[0]);

    // Slots
    let mut slots = Vec::new();
    if !state.slot_presets.is_empty() {
        slots.push(Line::from(format!("Bets: {} {}", state.slot_presets.join(" / "), snap.token_symbol)));
    }
    if let Some((_, reels)) = state.reels {
        let width = reels.iter().map(|r| r.width()).max().unwrap_or(0);
        let faces: Vec<String> = reels.iter().map(|r| format!("[{r:^width$}]")).collect();
        slots.push(Line::styled(faces.join(" "), Style::default().add_modifier(Modifier::BOLD)));
    }
    slots.push(Line::from(""));
    push_history(&mut slots, &snap.slots_history, &snap.token_symbol);
    let title = surface_title("Slots", ActionSurface::Slots, snap);
    f.render_widget(Paragraph::new(slots).block(Block::default().borders(Borders::ALL).title(title)), cols[1]);

    // Swap and transaction ledger, newest first
    let mut txs = Vec::new();
    if snap.ledger.is_empty() {
        txs.push(Line::styled("No transactions", Style::default().fg(Color::DarkGray)));
    }
    for tx in snap.ledger.iter().rev() {
        let color = match tx.status {
            TxStatus::Pending => Color::Yellow,
            TxStatus::Confirmed => Color::Green,
            TxStatus::Reverted => Color::Red,
            TxStatus::Unknown => Color::DarkGray,
        };
        let hash = format!("{:#x}", tx.hash);
        txs.push(Line::styled(
            format!("{} {:?} {}.. {:?}", tx.submitted_at.format("%H:%M:%S"), tx.kind, &hash[..10], tx.status),
            Style::default().fg(color),
        ));
    }
    let title = surface_title("Swap / Transactions", ActionSurface::Swap, snap);
    f.render_widget(Paragraph::new(txs).block(Block::default().borders(Borders::ALL).title(title)), cols[2]);
}

fn push_history(lines: &mut Vec<Line<'static>>, records: &[GameRecord], symbol: &str) {
    if records.is_empty() {
        lines.push(Line::styled("No games yet", Style::default().fg(Color::DarkGray)));
        return;
    }
    for r in records {
        let text = if r.won {
            format!("#{} {} bet {} won {} {symbol}", r.block_number, short_address(&r.player), r.bet, r.prize)
        } else {
            format!("#{} {} bet {} lost", r.block_number, short_address(&r.player), r.bet)
        };
        lines.push(Line::styled(text, Style::default().fg(if r.won { Color::Green } else { Color::Gray })));
    }
}

fn surface_title(name: &str, surface: ActionSurface, snap: &AppSnapshot) -> String {
    let busy = snap.busy.iter().any(|(s, busy)| *s == surface && *busy);
    if busy { format!("{name} (waiting...)") } else { name.to_string() }
}

fn draw_errors(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let visible = area.height.saturating_sub(2) as usize;
    let mut lines: Vec<Line> = Vec::new();
    if snap.errors.is_empty() {
        lines.push(Line::from("No errors"));
    } else {
        for e in snap.errors.iter().rev().take(visible) { lines.push(Line::from(e.clone())); }
    }
    let color = if snap.errors.is_empty() { Color::DarkGray } else { Color::Red };
    let errors = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Errors"));
    f.render_widget(errors.style(Style::default().fg(color)), area);
}

fn draw_help(f: &mut Frame, area: Rect) {
    let help = Paragraph::new(
        "c connect | d disconnect | n network | f flip | s spin | w swap | l liquidity | r refresh | x stop waiting | q/Esc quit",
    )
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_modals(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    let (title, lines, w, h): (&str, Vec<Line>, u16, u16) = match &state.mode {
        Mode::FlipModal(fs) => (
            "Flip a Coin",
            vec![
                Line::from(format!("Bet: {} {}", fs.input, snap.native_symbol)),
                Line::from("Enter=flip Esc=cancel digits/. to edit"),
            ],
            40,
            25,
        ),
        Mode::SlotsModal(ps) => {
            let mut lines = Vec::new();
            if state.slot_presets.is_empty() {
                lines.push(Line::from("Bet presets not loaded yet"));
            }
            for (i, preset) in state.slot_presets.iter().enumerate() {
                let cur = if i == ps.idx { ">" } else { " " };
                lines.push(Line::from(format!("{cur} {preset} {}", snap.token_symbol)));
            }
            lines.push(Line::from("Enter=spin Esc=cancel arrows select"));
            ("Spin the Slots", lines, 40, 40)
        }
        Mode::SwapModal(ss) => {
            let (from, to) = match ss.direction {
                SwapDirection::MintMeToRanger => (&snap.native_symbol, &snap.token_symbol),
                SwapDirection::RangerToMintMe => (&snap.token_symbol, &snap.native_symbol),
            };
            (
                "Swap",
                vec![
                    Line::from(format!("{from} -> {to}")),
                    Line::from(format!("Amount: {} {from}", ss.input)),
                    Line::from("Enter=swap Tab=flip direction Esc=cancel"),
                ],
                45,
                30,
            )
        }
        Mode::LiquidityModal(ls) => {
            let mark = |focused: bool| if focused { ">" } else { " " };
            (
                "Add Liquidity",
                vec![
                    Line::from(format!("{} {}: {}", mark(!ls.native_focused), snap.token_symbol, ls.token)),
                    Line::from(format!("{} {}: {}", mark(ls.native_focused), snap.native_symbol, ls.native)),
                    Line::from("Enter=add Tab=next field Esc=cancel"),
                ],
                45,
                30,
            )
        }
        Mode::QuitModal => ("Confirm Quit", vec![Line::from("Quit the arcade? (Y/N)")], 40, 20),
        Mode::Normal => return,
    };
    let area = centered_rect(w, h, f.area());
    let block = Block::default().borders(Borders::ALL).title(title);
    f.render_widget(Clear, area);
    f.render_widget(block.clone(), area);
    f.render_widget(Paragraph::new(lines), block.inner(area));
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Success => Color::Green,
        Severity::Warning => Color::Yellow,
        Severity::Danger => Color::Red,
    }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    horizontal[1]
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crossterm::event::KeyModifiers;
    use rand::{SeedableRng, rngs::StdRng};
    use ranger_arcade::{
        amount::{Decimals, FixedPointAmount},
        balance::Balances,
        gateway::Constraints,
    };

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn snapshot() -> AppSnapshot {
        let presets = [1, 5, 10]
            .into_iter()
            .map(|units| FixedPointAmount::from_whole(units, Decimals::REWARD_TOKEN))
            .collect();
        AppSnapshot {
            account: Some(Address::repeat_byte(0x11)),
            chain_id: Some(0x609e),
            required_chain_id: 0x609e,
            network_name: String::from("MintMe.com Coin"),
            native_symbol: String::from("MINTME"),
            token_symbol: String::from("RANGER"),
            balances: Balances::default(),
            constraints: Some(Constraints {
                coin_flip: BetConstraint::Range { max: FixedPointAmount::from_whole(100, Decimals::NATIVE) },
                slots: BetConstraint::Presets { amounts: presets },
            }),
            coin_flip_history: Vec::new(),
            slots_history: Vec::new(),
            busy: Vec::new(),
            ledger: Vec::new(),
            last_play: None,
            notification: None,
            status: String::new(),
            errors: Vec::new(),
        }
    }

    fn submitted(event: Option<UserEvent>) -> ActionRequest {
        match event {
            Some(UserEvent::Submit(request)) => request,
            _ => panic!("expected a submitted request"),
        }
    }

    #[test]
    fn handle_key__flip_modal_submits_typed_amount() {
        // given
        let snap = snapshot();
        let mut state = UiState::default();
        handle_key(&mut state, &snap, key(KeyCode::Char('f')));

        // when
        for c in ['1', 'x', '.', '5'] {
            handle_key(&mut state, &snap, key(KeyCode::Char(c)));
        }
        let event = handle_key(&mut state, &snap, key(KeyCode::Enter));

        // then
        assert_eq!(submitted(event), ActionRequest::Play { amount: String::from("1.5") });
        assert!(matches!(state.mode, Mode::Normal));
    }

    #[test]
    fn handle_key__slots_modal_only_offers_presets() {
        let snap = snapshot();
        let mut state = UiState::default();
        handle_key(&mut state, &snap, key(KeyCode::Char('s')));
        handle_key(&mut state, &snap, key(KeyCode::Right));
        handle_key(&mut state, &snap, key(KeyCode::Right));
        handle_key(&mut state, &snap, key(KeyCode::Right));

        let event = handle_key(&mut state, &snap, key(KeyCode::Enter));

        assert_eq!(submitted(event), ActionRequest::Spin { amount: String::from("10") });
    }

    #[test]
    fn handle_key__swap_modal_toggles_direction() {
        let snap = snapshot();
        let mut state = UiState::default();
        handle_key(&mut state, &snap, key(KeyCode::Char('w')));
        handle_key(&mut state, &snap, key(KeyCode::Tab));
        handle_key(&mut state, &snap, key(KeyCode::Char('2')));

        let event = handle_key(&mut state, &snap, key(KeyCode::Enter));

        assert_eq!(
            submitted(event),
            ActionRequest::Swap { direction: SwapDirection::RangerToMintMe, amount: String::from("2") }
        );
    }

    #[test]
    fn handle_key__liquidity_modal_fills_both_fields() {
        let snap = snapshot();
        let mut state = UiState::default();
        handle_key(&mut state, &snap, key(KeyCode::Char('l')));
        handle_key(&mut state, &snap, key(KeyCode::Char('4')));
        handle_key(&mut state, &snap, key(KeyCode::Tab));
        handle_key(&mut state, &snap, key(KeyCode::Char('2')));

        let event = handle_key(&mut state, &snap, key(KeyCode::Enter));

        assert_eq!(
            submitted(event),
            ActionRequest::AddLiquidity { token_amount: String::from("4"), native_amount: String::from("2") }
        );
    }

    #[test]
    fn handle_key__quit_needs_confirmation() {
        let snap = snapshot();
        let mut state = UiState::default();

        assert!(matches!(handle_key(&mut state, &snap, key(KeyCode::Char('q'))), Some(UserEvent::Redraw)));
        assert!(matches!(handle_key(&mut state, &snap, key(KeyCode::Char('y'))), Some(UserEvent::Quit)));
    }

    #[test]
    fn reels_for__win_shows_three_of_a_kind() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let reels = reels_for(true, &mut rng);
            assert!(reels.iter().all(|r| *r == reels[0]));
        }
    }

    #[test]
    fn reels_for__loss_never_lines_up() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let [a, b, c] = reels_for(false, &mut rng);
            assert!(a != b && b != c && a != c);
        }
    }

    #[test]
    fn short_address__keeps_prefix_and_suffix() {
        let address = Address::repeat_byte(0xab);
        assert_eq!(short_address(&address), "0xabab...abab");
    }
}
