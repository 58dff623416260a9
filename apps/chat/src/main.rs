use std::io::Write;
use std::sync::Arc;

use barber_booking::form::{ServiceList, MSG_NO_SERVICES};
use barber_booking::intent::format_cop;
use barber_booking::schedule::{DirectoryState, MSG_NO_AVAILABLE_DAYS};
use barber_booking::{
    BlockStatus, BookingApi, BookingSession, BrowserState, ClientConfig, HttpBookingApi, SessionError,
    SubmitError,
};
use chrono::NaiveDate;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// How a nested prompt loop ended.
enum Outcome {
    /// Finished normally; back to the caller's menu.
    Done,
    /// Go one level up.
    Back,
    /// Standard input closed.
    Eof,
}

struct Console {
    lines: Lines<BufReader<Stdin>>,
}

impl Console {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Print `text` and read one trimmed line. `None` at end of input.
    async fn ask(&mut self, text: &str) -> anyhow::Result<Option<String>> {
        print!("{} ", text);
        std::io::stdout().flush()?;
        Ok(self.lines.next_line().await?.map(|l| l.trim().to_string()))
    }
}

fn say(text: &str) {
    println!("{}", text);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so they never mix with the conversation
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::from_env()?;
    let api: Arc<dyn BookingApi> = Arc::new(HttpBookingApi::new(
        config.api_base_url.clone(),
        config.request_timeout,
    )?);

    tracing::info!("💈 booking chat starting for {}", config.subdomain);

    let mut session = BookingSession::from_config(&config, api).await;
    let mut console = Console::new();
    let establishment = session.establishment();

    loop {
        say("");
        say(&format!("👋 ¡Bienvenido a {}!", establishment.current().name));
        say("1. Agendar una cita");
        say("2. Cancelar una cita");
        say("0. Salir");

        let Some(choice) = console.ask("¿Qué deseas hacer?").await? else {
            break;
        };
        let outcome = match choice.as_str() {
            "1" => booking_flow(&mut session, &mut console, config.today()).await?,
            "2" => cancel_flow(&mut session, &mut console).await?,
            "0" => break,
            _ => {
                say("Elige 1, 2 o 0.");
                Outcome::Done
            }
        };
        if let Outcome::Eof = outcome {
            break;
        }
    }

    say("¡Hasta pronto!");
    Ok(())
}

// ── Booking ──

async fn booking_flow(
    session: &mut BookingSession,
    console: &mut Console,
    today: NaiveDate,
) -> anyhow::Result<Outcome> {
    session.reopen_schedule(today);
    session.load_barbers().await;

    loop {
        let barbers: Vec<String> = match session.directory().state() {
            DirectoryState::Loading => {
                say("Cargando barberos...");
                Vec::new()
            }
            DirectoryState::Failed(message) => {
                say(message);
                let Some(input) = console.ask("r: reintentar, v: volver").await? else {
                    return Ok(Outcome::Eof);
                };
                match input.as_str() {
                    "r" => {
                        session.retry_barbers().await;
                    }
                    "v" => return Ok(Outcome::Back),
                    _ => {}
                }
                continue;
            }
            DirectoryState::Ready(_) => session
                .directory()
                .filtered()
                .into_iter()
                .map(|b| b.name.clone())
                .collect(),
        };

        say("");
        say("✂️ Barberos:");
        if !session.directory().search().is_empty() {
            say(&format!("  Búsqueda: \"{}\" (Enter para ver todos)", session.directory().search()));
        }
        if barbers.is_empty() {
            say("  (ningún barbero coincide con la búsqueda)");
        }
        for (i, name) in barbers.iter().enumerate() {
            say(&format!("  {}. {}", i + 1, name));
        }

        let Some(input) = console
            .ask("Elige un número, escribe para buscar o v para volver:")
            .await?
        else {
            return Ok(Outcome::Eof);
        };

        if input == "v" {
            session.close_schedule();
            return Ok(Outcome::Back);
        }
        let picked = input
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| barbers.get(i));
        let Some(barber) = picked else {
            session.directory_mut().set_search(&input);
            continue;
        };

        session.choose_barber(barber);
        session.wait_for_week().await;
        match week_flow(session, console).await? {
            Outcome::Back => {
                session.directory_mut().set_search("");
                session.reopen_schedule(today);
            }
            other => return Ok(other),
        }
    }
}

async fn week_flow(session: &mut BookingSession, console: &mut Console) -> anyhow::Result<Outcome> {
    loop {
        session.poll_weeks();
        let mut choices: Vec<(NaiveDate, usize)> = Vec::new();

        say("");
        say(&format!("📅 Semana {}", session.browser().week_label()));
        match session.browser().state() {
            BrowserState::Ready { barber, .. } => {
                say(&format!("Horarios de {}:", barber));
                for day in session.week_view() {
                    let today = if day.is_today { " (hoy)" } else { "" };
                    say(&format!("{} {}{}", day.label, day.date.format("%d/%m"), today));
                    let checking = day.block_status == BlockStatus::Loading;
                    let selectable: Vec<_> = day.slots.iter().filter(|s| s.selectable).collect();
                    if selectable.is_empty() && !checking {
                        say("    sin horarios disponibles");
                    }
                    for view in selectable {
                        choices.push((day.date, view.index));
                        let note = if view.slot.is_last_of_day() {
                            format!(" ({} min, servicios limitados)", view.slot.duration_minutes())
                        } else {
                            String::new()
                        };
                        say(&format!(
                            "  {}. {} - {}{}",
                            choices.len(),
                            view.slot.start().to_12h(),
                            view.slot.end().to_12h(),
                            note
                        ));
                    }
                    if checking {
                        say("    último horario: verificando disponibilidad...");
                    }
                }
            }
            BrowserState::NoAvailableDays { .. } => say(MSG_NO_AVAILABLE_DAYS),
            BrowserState::Error { message, .. } => say(message),
            BrowserState::Loading { .. } => say("Cargando horario..."),
            BrowserState::NoBarberSelected | BrowserState::BarberChosen { .. } | BrowserState::Closed => {
                return Ok(Outcome::Back);
            }
        }

        let Some(input) = console
            .ask("Elige un horario, a: semana anterior, s: siguiente, h: hoy, r: reintentar, Enter: actualizar, v: volver:")
            .await?
        else {
            return Ok(Outcome::Eof);
        };

        let issued = match input.as_str() {
            "" => false,
            "a" => session.previous_week(),
            "s" => session.next_week(),
            "h" => session.current_week(),
            "r" => session.retry_week(),
            "v" => return Ok(Outcome::Back),
            other => {
                let picked = other
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| choices.get(i).copied());
                let Some((date, index)) = picked else {
                    say("Opción no válida.");
                    continue;
                };
                if let Err(e) = session.select_slot(date, index).await {
                    say(&e.user_message());
                    continue;
                }
                match form_flow(session, console).await? {
                    Outcome::Back => continue,
                    other => return Ok(other),
                }
            }
        };
        if issued {
            session.wait_for_week().await;
        }
    }
}

async fn form_flow(session: &mut BookingSession, console: &mut Console) -> anyhow::Result<Outcome> {
    if session.form().has_no_services() {
        match session.form().services() {
            ServiceList::Unavailable(message) => say(message),
            _ => say(MSG_NO_SERVICES),
        }
        session.close_form();
        return Ok(Outcome::Back);
    }

    let mut ask_name = true;
    let mut ask_phone = true;
    let mut ask_service = true;
    let mut ask_email = true;

    loop {
        if ask_name {
            let Some(name) = console.ask("Tu nombre:").await? else {
                return Ok(Outcome::Eof);
            };
            session.form_mut().set_client_name(&name);
        }
        if ask_phone {
            let Some(phone) = console.ask("Tu teléfono (10 dígitos):").await? else {
                return Ok(Outcome::Eof);
            };
            session.form_mut().set_phone(&phone);
        }
        if ask_service {
            let services: Vec<(String, i64)> = session
                .form()
                .available_services()
                .iter()
                .map(|s| (s.name.clone(), s.price))
                .collect();
            say("Servicios:");
            for (i, (name, price)) in services.iter().enumerate() {
                say(&format!("  {}. {} {}", i + 1, name, format_cop(*price)));
            }
            let Some(choice) = console.ask("Elige un servicio:").await? else {
                return Ok(Outcome::Eof);
            };
            let name = choice
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| services.get(i))
                .map(|(name, _)| name.clone())
                .unwrap_or(choice);
            session.form_mut().set_service(&name);
        }
        if ask_email {
            let Some(email) = console.ask("Tu correo (opcional, Enter para omitir):").await? else {
                return Ok(Outcome::Eof);
            };
            session.form_mut().set_email(&email);
        }

        match session.submit_booking().await {
            Ok(receipt) => {
                say(&format!("🧑 {}", receipt.summary));
                say(&format!("💈 {}", receipt.confirmation.reply));
                say(&receipt.confirmation.confirmation);
                return Ok(Outcome::Done);
            }
            Err(SessionError::Form(SubmitError::Invalid(errors))) => {
                for message in errors.messages() {
                    say(&format!("⚠️ {}", message));
                }
                ask_name = errors.client_name;
                ask_phone = errors.phone;
                ask_service = errors.service;
                ask_email = errors.email;
            }
            Err(SessionError::Api(e)) => {
                say(&e.user_message());
                return retry_loop(session, console).await;
            }
            Err(other) => {
                say(&other.user_message());
                session.close_form();
                return Ok(Outcome::Back);
            }
        }
    }
}

async fn retry_loop(session: &mut BookingSession, console: &mut Console) -> anyhow::Result<Outcome> {
    while session.has_pending_booking() {
        let Some(input) = console.ask("r: reintentar, v: volver:").await? else {
            return Ok(Outcome::Eof);
        };
        if input != "r" {
            return Ok(Outcome::Back);
        }
        match session.retry_booking().await {
            Ok(receipt) => {
                say(&format!("💈 {}", receipt.confirmation.reply));
                say(&receipt.confirmation.confirmation);
                return Ok(Outcome::Done);
            }
            Err(e) => say(&e.user_message()),
        }
    }
    Ok(Outcome::Back)
}

// ── Cancellation ──

async fn cancel_flow(session: &mut BookingSession, console: &mut Console) -> anyhow::Result<Outcome> {
    let Some(prompt) = console
        .ask("Escribe tu nombre, la fecha y la hora de la cita que deseas cancelar:")
        .await?
    else {
        return Ok(Outcome::Eof);
    };
    match session.cancel(&prompt).await {
        Ok(receipt) => {
            say(&format!("💈 {}", receipt.reply));
            say(receipt.confirmation);
        }
        Err(e) => say(&e.user_message()),
    }
    Ok(Outcome::Done)
}
