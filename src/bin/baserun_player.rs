use ethers::types::U256;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use baserun_backend::{
    config::{Config, PuzzleMode},
    constants::DEFAULT_ROW_SIZES,
    integrations::session_backend::HttpSessionBackend,
    models::{parse_u256, TicketPack},
    services::{
        puzzle_engine::{CellContent, CellView, PuzzleView},
        ContractGateway, EvmGame, FlowCoordinator, FlowState, Puzzle, PuzzleStatus,
        RevealOutcome,
    },
};

const USAGE: &str = "usage: baserun-player <balance|buy <1|10|50>|play|recover <ticket_id>|claim <ticket_id>|practice>";

type Input = Lines<BufReader<Stdin>>;

fn render(view: &PuzzleView) -> String {
    let mut out = String::new();
    for (row, cells) in view.cells.iter().enumerate() {
        let marker = if view.target_letter.is_some() && row == view.current_row {
            ">"
        } else {
            " "
        };
        out.push_str(&format!("{} row {} ", marker, row));
        for cell in cells {
            let glyph = match cell {
                CellView::Hidden => "[ ]".to_string(),
                CellView::Revealed(CellContent::Letter(c)) => {
                    format!("[{}]", c.to_ascii_uppercase())
                }
                CellView::Revealed(CellContent::Trap) => "[X]".to_string(),
                CellView::Faded(Some(CellContent::Letter(c))) => format!("({})", c),
                CellView::Faded(Some(CellContent::Trap)) => "(x)".to_string(),
                CellView::Faded(None) => "( )".to_string(),
            };
            out.push_str(&glyph);
        }
        out.push('\n');
    }
    out.push_str(&format!("letters: {}\n", view.revealed_letters));
    out
}

fn parse_cell(line: &str) -> Option<(usize, usize)> {
    let mut parts = line.split_whitespace();
    let row = parts.next()?.parse().ok()?;
    let col = parts.next()?.parse().ok()?;
    Some((row, col))
}

async fn build_flow(config: &Config) -> anyhow::Result<FlowCoordinator> {
    let chain = EvmGame::wallet_from_config(config)?;
    let gateway = ContractGateway::new(Arc::new(chain), config.chain_id);
    tracing::info!(
        "Player {:?} on chain {}",
        gateway.player()?,
        gateway.required_chain_id()
    );
    let backend = HttpSessionBackend::new(config.backend_url.clone());
    let mut flow = FlowCoordinator::new(gateway, Arc::new(backend));
    flow.refresh_balances().await?;
    Ok(flow)
}

fn print_snapshot(flow: &FlowCoordinator) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&flow.snapshot())?);
    Ok(())
}

async fn run_balance(config: &Config) -> anyhow::Result<()> {
    let flow = build_flow(config).await?;
    print_snapshot(&flow)
}

async fn run_buy(config: &Config, args: &[String]) -> anyhow::Result<()> {
    let count: u64 = args
        .get(2)
        .ok_or_else(|| anyhow::anyhow!(USAGE))?
        .parse()?;
    let pack = TicketPack::try_from(count)?;
    let mut flow = build_flow(config).await?;
    flow.buy(pack).await?;
    println!("Bought {} ticket(s); balance {}", pack.count(), flow.ticket_balance());
    Ok(())
}

// Reads cells until the round ends, then claims a win.
async fn play_round(flow: &mut FlowCoordinator, input: &mut Input) -> anyhow::Result<()> {
    while flow.state() == FlowState::Playing {
        if let Some(puzzle) = flow.puzzle() {
            print!("{}", render(&puzzle.view()));
            println!("{}", puzzle.status_line());
        }
        println!("reveal <row> <col>:");
        let Some(line) = input.next_line().await? else {
            anyhow::bail!("input closed mid-round");
        };
        let Some((row, col)) = parse_cell(&line) else {
            println!("expected two numbers");
            continue;
        };
        match flow.reveal(row, col).await {
            Ok(RevealOutcome::Ignored) => println!("That cell cannot be revealed now"),
            Ok(RevealOutcome::Hit { letter, .. }) => {
                println!("Found \"{}\"", letter.to_ascii_uppercase())
            }
            Ok(_) => {}
            Err(e) => println!("Reveal failed: {}", e),
        }
    }

    if let Some(puzzle) = flow.puzzle() {
        print!("{}", render(&puzzle.view()));
        println!("{}", puzzle.status_line());
    }
    if flow.state() == FlowState::Won {
        claim_won(flow).await?;
    }
    Ok(())
}

async fn claim_won(flow: &mut FlowCoordinator) -> anyhow::Result<()> {
    if flow.attestation().is_none() {
        flow.request_attestation().await?;
    }
    let amount = flow.claim().await?;
    println!("Claimed {} ETH", ethers::utils::format_ether(amount));
    Ok(())
}

async fn run_play(config: &Config) -> anyhow::Result<()> {
    if config.puzzle_mode == PuzzleMode::Local {
        tracing::info!("PUZZLE_MODE=local; playing an offline practice round");
        return run_practice().await;
    }
    let mut flow = build_flow(config).await?;
    if flow.state() == FlowState::Initial && flow.request_play()? == FlowState::BuyTickets {
        anyhow::bail!("No tickets left. Buy some first: baserun-player buy 10");
    }
    let ticket = flow.start_attempt().await?;
    println!(
        "Ticket {} started with prize snapshot {} ETH",
        ticket.ticket_id,
        ethers::utils::format_ether(ticket.prize_snapshot)
    );
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    play_round(&mut flow, &mut input).await
}

async fn recovered_flow(config: &Config, args: &[String]) -> anyhow::Result<FlowCoordinator> {
    let raw = args.get(2).ok_or_else(|| anyhow::anyhow!(USAGE))?;
    let ticket_id: U256 = parse_u256(raw, "ticket_id")?;
    let mut flow = build_flow(config).await?;
    let state = flow.recover(ticket_id).await?;
    println!("Ticket {} recovered in state {:?}", ticket_id, state);
    Ok(flow)
}

async fn run_recover(config: &Config, args: &[String]) -> anyhow::Result<()> {
    let mut flow = recovered_flow(config, args).await?;
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    play_round(&mut flow, &mut input).await
}

async fn run_claim(config: &Config, args: &[String]) -> anyhow::Result<()> {
    let mut flow = recovered_flow(config, args).await?;
    if flow.state() != FlowState::Won {
        anyhow::bail!("Ticket is not claimable (state {:?})", flow.state());
    }
    claim_won(&mut flow).await
}

async fn run_practice() -> anyhow::Result<()> {
    let mut rng = StdRng::from_os_rng();
    let mut puzzle = Puzzle::self_contained(DEFAULT_ROW_SIZES, &mut rng);
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    println!("commands: <row> <col> | play | shuffle | reset | quit");

    loop {
        print!("{}", render(&puzzle.view()));
        println!("{}", puzzle.status_line());
        let Some(line) = input.next_line().await? else {
            return Ok(());
        };
        match line.trim() {
            "quit" => return Ok(()),
            "play" if puzzle.status() == PuzzleStatus::Idle => puzzle.start(),
            "shuffle" => {
                if !puzzle.shuffle(&mut rng) {
                    println!("Shuffle is only available on an idle board; reset first");
                }
            }
            "play" => {
                puzzle.reset(&mut rng);
                puzzle.start();
            }
            "reset" => {
                puzzle.reset(&mut rng);
            }
            other => match parse_cell(other) {
                Some((row, col)) => {
                    if puzzle.reveal(row, col).await? == RevealOutcome::Ignored {
                        println!("That cell cannot be revealed now");
                    }
                    if matches!(puzzle.status(), PuzzleStatus::Won | PuzzleStatus::Lost) {
                        println!("type reset for another round");
                    }
                }
                None => println!("unknown command"),
            },
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "baserun_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("{USAGE}");
        std::process::exit(1);
    }

    let result = match Config::from_env() {
        Ok(config) => match config.validate() {
            Ok(()) => match args[1].as_str() {
                "balance" => run_balance(&config).await,
                "buy" => run_buy(&config, &args).await,
                "play" => run_play(&config).await,
                "recover" => run_recover(&config, &args).await,
                "claim" => run_claim(&config, &args).await,
                "practice" => run_practice().await,
                other => Err(anyhow::anyhow!("unknown subcommand: {other}")),
            },
            Err(e) => Err(e),
        },
        Err(e) => Err(e),
    };

    if let Err(err) = result {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
