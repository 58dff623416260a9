use chrono::{Datelike, Days, FixedOffset, NaiveDate, Utc, Weekday};

const DAY_SHORT: [&str; 7] = ["Lun", "Mar", "Mié", "Jue", "Vie", "Sáb", "Dom"];
const DAY_LONG: [&str; 7] = [
    "lunes", "martes", "miércoles", "jueves", "viernes", "sábado", "domingo",
];
const MONTH_SHORT: [&str; 12] = [
    "Ene", "Feb", "Mar", "Abr", "May", "Jun", "Jul", "Ago", "Sep", "Oct", "Nov", "Dic",
];
const MONTH_LONG: [&str; 12] = [
    "enero", "febrero", "marzo", "abril", "mayo", "junio",
    "julio", "agosto", "septiembre", "octubre", "noviembre", "diciembre",
];

/// Calendar date at the establishment, given its UTC offset.
pub fn establishment_today(offset: FixedOffset) -> NaiveDate {
    Utc::now().with_timezone(&offset).date_naive()
}

/// Monday of the ISO week containing `date`.
pub fn week_start_for(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

/// Sunday closing the week that starts at `week_start`.
pub fn week_end(week_start: NaiveDate) -> NaiveDate {
    week_start + Days::new(6)
}

/// "20 Oct - 26 Oct"
pub fn week_range_label(week_start: NaiveDate) -> String {
    let end = week_end(week_start);
    format!(
        "{} {} - {} {}",
        week_start.day(),
        month_short(week_start),
        end.day(),
        month_short(end)
    )
}

pub fn day_label(date: NaiveDate) -> &'static str {
    DAY_SHORT[date.weekday().num_days_from_monday() as usize]
}

pub fn month_short(date: NaiveDate) -> &'static str {
    MONTH_SHORT[date.month0() as usize]
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// "lunes 19 de octubre de 2026"
pub fn format_long_date(date: NaiveDate) -> String {
    format!(
        "{} {} de {} de {}",
        DAY_LONG[date.weekday().num_days_from_monday() as usize],
        date.day(),
        MONTH_LONG[date.month0() as usize],
        date.year()
    )
}

// ── Tests ──
