//! Row/reveal rules for the four-row letter puzzle.
//!
//! A [`Puzzle`] tracks only what has been shown. Whether a cell holds the
//! row's letter is decided by a [`RevealJudge`]: [`LocalJudge`] owns the board
//! truth for practice rounds, [`RemoteJudge`] forwards each reveal to the
//! session backend and never sees the layout of unrevealed cells.

use async_trait::async_trait;
use ethers::types::U256;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;

use crate::{
    config::PuzzleMode,
    constants::{DEFAULT_ROW_SIZES, LETTERS, ROW_COUNT},
    error::{AppError, Result},
    integrations::session_backend::SessionBackend,
    models::{ClickResult, SessionStatus},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PuzzleStatus {
    Idle,
    Playing,
    Won,
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CellContent {
    Letter(char),
    Trap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CellView {
    Hidden,
    Revealed(CellContent),
    /// Shown inactive after a loss; `None` when the content is not known locally.
    Faded(Option<CellContent>),
}

/// What the judge decided for one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Judgement {
    Letter {
        letter: char,
        won: bool,
        next_row: Option<usize>,
    },
    Trap,
    BotDetected,
}

/// Result of a reveal request as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    /// Request was not valid in the current state; nothing changed.
    Ignored,
    Hit { letter: char, next_row: usize },
    Won { letter: char },
    Lost { bot_detected: bool },
}

/// Letter position per row. Only ever held by a self-contained judge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardTruth {
    letter_positions: [usize; ROW_COUNT],
}

impl BoardTruth {
    pub fn random<R: Rng + ?Sized>(row_sizes: &[usize; ROW_COUNT], rng: &mut R) -> Self {
        let mut letter_positions = [0; ROW_COUNT];
        for (row, size) in row_sizes.iter().enumerate() {
            letter_positions[row] = rng.random_range(0..*size);
        }
        Self { letter_positions }
    }

    pub fn content(&self, row: usize, col: usize) -> CellContent {
        if self.letter_positions[row] == col {
            CellContent::Letter(LETTERS[row])
        } else {
            CellContent::Trap
        }
    }
}

#[async_trait]
pub trait RevealJudge: Send + Sync {
    fn mode(&self) -> PuzzleMode;

    async fn judge(&self, row: usize, col: usize) -> Result<Judgement>;

    /// Board truth, when this judge is allowed to hold it.
    fn truth(&self) -> Option<&BoardTruth> {
        None
    }
}

pub struct LocalJudge {
    truth: BoardTruth,
}

impl LocalJudge {
    pub fn new(truth: BoardTruth) -> Self {
        Self { truth }
    }
}

#[async_trait]
impl RevealJudge for LocalJudge {
    fn mode(&self) -> PuzzleMode {
        PuzzleMode::Local
    }

    async fn judge(&self, row: usize, col: usize) -> Result<Judgement> {
        Ok(match self.truth.content(row, col) {
            CellContent::Letter(letter) => Judgement::Letter {
                letter,
                won: row == ROW_COUNT - 1,
                next_row: None,
            },
            CellContent::Trap => Judgement::Trap,
        })
    }

    fn truth(&self) -> Option<&BoardTruth> {
        Some(&self.truth)
    }
}

pub struct RemoteJudge {
    backend: Arc<dyn SessionBackend>,
    ticket_id: U256,
}

impl RemoteJudge {
    pub fn new(backend: Arc<dyn SessionBackend>, ticket_id: U256) -> Self {
        Self { backend, ticket_id }
    }
}

#[async_trait]
impl RevealJudge for RemoteJudge {
    fn mode(&self) -> PuzzleMode {
        PuzzleMode::Server
    }

    async fn judge(&self, row: usize, col: usize) -> Result<Judgement> {
        let response = self.backend.click(self.ticket_id, row, col).await?;
        Ok(match response.result {
            ClickResult::Hit => Judgement::Letter {
                letter: response
                    .letter
                    .as_deref()
                    .and_then(|l| l.chars().next())
                    .map(|c| c.to_ascii_lowercase())
                    .unwrap_or(LETTERS[row]),
                won: response.game_status == SessionStatus::Won,
                next_row: response.next_row,
            },
            ClickResult::Miss => Judgement::Trap,
            ClickResult::BotDetected => Judgement::BotDetected,
        })
    }
}

/// Read-only copy of the puzzle for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PuzzleView {
    pub mode: PuzzleMode,
    pub row_sizes: [usize; ROW_COUNT],
    pub cells: Vec<Vec<CellView>>,
    pub current_row: usize,
    pub status: PuzzleStatus,
    pub revealed_letters: String,
    pub target_letter: Option<char>,
}

pub struct Puzzle {
    row_sizes: [usize; ROW_COUNT],
    cells: Vec<Vec<CellView>>,
    current_row: usize,
    status: PuzzleStatus,
    revealed_letters: Vec<char>,
    judge: Box<dyn RevealJudge>,
}

impl Puzzle {
    /// Practice board: letter positions are drawn here, uniformly per row.
    pub fn self_contained<R: Rng + ?Sized>(row_sizes: [usize; ROW_COUNT], rng: &mut R) -> Self {
        let truth = BoardTruth::random(&row_sizes, rng);
        Self::with_judge(row_sizes, Box::new(LocalJudge::new(truth)))
    }

    /// Gated board: layout sizes come from the backend, contents never do.
    pub fn server_authoritative(
        row_sizes: &[usize],
        backend: Arc<dyn SessionBackend>,
        ticket_id: U256,
    ) -> Result<Self> {
        let row_sizes = validate_row_sizes(row_sizes)?;
        Ok(Self::with_judge(
            row_sizes,
            Box::new(RemoteJudge::new(backend, ticket_id)),
        ))
    }

    fn with_judge(row_sizes: [usize; ROW_COUNT], judge: Box<dyn RevealJudge>) -> Self {
        Self {
            cells: empty_cells(&row_sizes),
            row_sizes,
            current_row: 0,
            status: PuzzleStatus::Idle,
            revealed_letters: Vec::new(),
            judge,
        }
    }

    pub fn status(&self) -> PuzzleStatus {
        self.status
    }

    pub fn current_row(&self) -> usize {
        self.current_row
    }

    pub fn mode(&self) -> PuzzleMode {
        self.judge.mode()
    }

    pub fn target_letter(&self) -> Option<char> {
        (self.status == PuzzleStatus::Playing).then(|| LETTERS[self.current_row])
    }

    pub fn start(&mut self) {
        self.current_row = 0;
        self.revealed_letters.clear();
        self.status = PuzzleStatus::Playing;
    }

    /// Continues a backend session that already advanced past earlier rows.
    pub fn resume(&mut self, current_row: usize) -> Result<()> {
        if current_row >= ROW_COUNT {
            return Err(AppError::Backend(format!(
                "Session reports row {} of {}",
                current_row, ROW_COUNT
            )));
        }
        self.current_row = current_row;
        self.revealed_letters = LETTERS[..current_row].to_vec();
        self.status = PuzzleStatus::Playing;
        Ok(())
    }

    /// Permutes row sizes and redraws the board. Only while idle and only
    /// for a self-contained board.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if self.status != PuzzleStatus::Idle || self.judge.truth().is_none() {
            return false;
        }
        let mut sizes = DEFAULT_ROW_SIZES;
        sizes.shuffle(rng);
        self.row_sizes = sizes;
        self.redraw(rng);
        true
    }

    /// New letter positions with the same sizes; the board returns to idle.
    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if self.judge.truth().is_none() {
            return false;
        }
        self.redraw(rng);
        true
    }

    fn redraw<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let truth = BoardTruth::random(&self.row_sizes, rng);
        self.judge = Box::new(LocalJudge::new(truth));
        self.cells = empty_cells(&self.row_sizes);
        self.current_row = 0;
        self.revealed_letters.clear();
        self.status = PuzzleStatus::Idle;
    }

    pub fn can_reveal(&self, row: usize, col: usize) -> bool {
        self.status == PuzzleStatus::Playing
            && row == self.current_row
            && col < self.row_sizes[row]
            && self.cells[row][col] == CellView::Hidden
    }

    /// Reveals one cell. Invalid requests are ignored without consulting the
    /// judge; judge errors leave the puzzle untouched.
    pub async fn reveal(&mut self, row: usize, col: usize) -> Result<RevealOutcome> {
        if row >= ROW_COUNT || !self.can_reveal(row, col) {
            return Ok(RevealOutcome::Ignored);
        }

        let judgement = self.judge.judge(row, col).await?;
        let outcome = match judgement {
            Judgement::Letter {
                letter,
                won,
                next_row,
            } => {
                let next = if won {
                    None
                } else {
                    let next = next_row.unwrap_or(row + 1);
                    if next <= row || next >= ROW_COUNT {
                        return Err(AppError::Backend(format!(
                            "Session advanced from row {} to row {} without a win",
                            row, next
                        )));
                    }
                    Some(next)
                };

                self.cells[row][col] = CellView::Revealed(CellContent::Letter(letter));
                self.revealed_letters.push(letter);
                match next {
                    None => {
                        self.status = PuzzleStatus::Won;
                        RevealOutcome::Won { letter }
                    }
                    Some(next) => {
                        self.current_row = next;
                        RevealOutcome::Hit {
                            letter,
                            next_row: next,
                        }
                    }
                }
            }
            Judgement::Trap => {
                self.cells[row][col] = CellView::Revealed(CellContent::Trap);
                self.lose();
                RevealOutcome::Lost {
                    bot_detected: false,
                }
            }
            Judgement::BotDetected => {
                self.cells[row][col] = CellView::Faded(None);
                self.lose();
                RevealOutcome::Lost { bot_detected: true }
            }
        };
        Ok(outcome)
    }

    // Terminal loss; every still-hidden cell is shown faded.
    fn lose(&mut self) {
        self.status = PuzzleStatus::Lost;
        let truth = self.judge.truth().cloned();
        for (row, cells) in self.cells.iter_mut().enumerate() {
            for (col, cell) in cells.iter_mut().enumerate() {
                if *cell == CellView::Hidden {
                    *cell = CellView::Faded(truth.as_ref().map(|t| t.content(row, col)));
                }
            }
        }
    }

    pub fn status_line(&self) -> String {
        match self.status {
            PuzzleStatus::Idle => String::new(),
            PuzzleStatus::Playing => format!(
                "Row {}: Find the letter \"{}\"",
                self.current_row + 1,
                LETTERS[self.current_row].to_ascii_uppercase()
            ),
            PuzzleStatus::Won => "YOU WIN! You spelled BASE!".to_string(),
            PuzzleStatus::Lost => "GAME OVER! You hit a skull!".to_string(),
        }
    }

    pub fn view(&self) -> PuzzleView {
        PuzzleView {
            mode: self.mode(),
            row_sizes: self.row_sizes,
            cells: self.cells.clone(),
            current_row: self.current_row,
            status: self.status,
            revealed_letters: self
                .revealed_letters
                .iter()
                .map(|c| c.to_ascii_uppercase())
                .collect(),
            target_letter: self.target_letter(),
        }
    }
}

fn empty_cells(row_sizes: &[usize; ROW_COUNT]) -> Vec<Vec<CellView>> {
    row_sizes
        .iter()
        .map(|size| vec![CellView::Hidden; *size])
        .collect()
}

fn validate_row_sizes(row_sizes: &[usize]) -> Result<[usize; ROW_COUNT]> {
    let sizes: [usize; ROW_COUNT] = row_sizes.try_into().map_err(|_| {
        AppError::Backend(format!(
            "Expected {} rows from session, got {}",
            ROW_COUNT,
            row_sizes.len()
        ))
    })?;
    let mut sorted = sizes;
    sorted.sort_unstable();
    if sorted != DEFAULT_ROW_SIZES {
        return Err(AppError::Backend(format!(
            "Session row sizes {:?} are not a permutation of {:?}",
            sizes, DEFAULT_ROW_SIZES
        )));
    }
    Ok(sizes)
}
