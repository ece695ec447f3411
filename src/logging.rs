// Logging module: log lines go to a single file that is rotated once a
// week, the way the BigBlueButton post-publish scripts keep their logs.
// The subscriber is returned as a `Dispatch` so the caller decides where
// it is active; nothing is installed globally.

use anyhow::{Context, Result};
use chrono::{Datelike, Days, Local, NaiveDate};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::Dispatch;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

type Clock = Box<dyn Fn() -> NaiveDate + Send + Sync>;

/// Build the logging handle for one hook run.
pub fn init(log_file: &Path, directive: &str) -> Result<Dispatch> {
    let filter = EnvFilter::try_new(directive)
        .with_context(|| format!("Invalid log level directive: {directive}"))?;
    let writer = WeeklyLogFile::open(log_file)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(writer);

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    Ok(Dispatch::new(subscriber))
}

/// First day (Sunday) of the week containing `date`.
fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_sunday());
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

struct State {
    file: File,
    week: NaiveDate,
}

/// Append-only log file that moves itself aside to `<name>.<YYYYMMDD>`
/// when the first line of a new week is written. The suffix is the
/// Saturday closing the old week.
pub struct WeeklyLogFile {
    path: PathBuf,
    clock: Clock,
    state: Mutex<State>,
}

impl WeeklyLogFile {
    pub fn open(path: &Path) -> Result<Self> {
        Self::with_clock(path, Box::new(|| Local::now().date_naive()))
    }

    pub(crate) fn with_clock(path: &Path, clock: Clock) -> Result<Self> {
        let today = clock();
        let week = match last_modified(path) {
            Some(date) => week_start(date),
            None => week_start(today),
        };
        let file = open_append(path)?;
        Ok(WeeklyLogFile {
            path: path.to_path_buf(),
            clock,
            state: Mutex::new(State { file, week }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves the file usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn rotate_if_due(&self, state: &mut State) -> io::Result<()> {
        let current = week_start((self.clock)());
        if current <= state.week {
            return Ok(());
        }
        state.file.flush()?;

        let closing = state.week.checked_add_days(Days::new(6)).unwrap_or(state.week);
        state.week = current;

        // If the file cannot be moved aside or reopened, keep writing to
        // the handle already open until the next week.
        let target = free_rotation_target(&self.path, closing);
        if fs::rename(&self.path, &target).is_err() {
            return Ok(());
        }
        if let Ok(file) = OpenOptions::new().create(true).append(true).open(&self.path) {
            state.file = file;
        }
        Ok(())
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

fn last_modified(path: &Path) -> Option<NaiveDate> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    Some(chrono::DateTime::<Local>::from(modified).date_naive())
}

/// `<path>.<YYYYMMDD>`, or with a `.N` counter if that name is taken.
fn free_rotation_target(path: &Path, closing: NaiveDate) -> PathBuf {
    let base = format!("{}.{}", path.display(), closing.format("%Y%m%d"));
    let mut target = PathBuf::from(&base);
    let mut n = 0;
    while target.exists() {
        n += 1;
        target = PathBuf::from(format!("{base}.{n}"));
    }
    target
}

/// Writer handed out per event by [`WeeklyLogFile`].
pub struct WeeklyLogWriter<'a> {
    log: &'a WeeklyLogFile,
}

impl Write for WeeklyLogWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.log.lock();
        self.log.rotate_if_due(&mut state)?;
        state.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.log.lock().file.flush()
    }
}

impl<'a> MakeWriter<'a> for WeeklyLogFile {
    type Writer = WeeklyLogWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        WeeklyLogWriter { log: self }
    }
}
