mod db_url;
mod seed;

use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use course_core::model::{CourseId, LessonId, Progress, ProgressUpdate, StudentId};
use services::{AppServices, Clock, ProgressServiceError};
use tracing_subscriber::EnvFilter;

use crate::db_url::{normalize_sqlite_url, prepare_sqlite_file};
use crate::seed::DemoLoader;

#[derive(Debug, Parser)]
#[command(name = "app", about = "Course progress tracking")]
struct Args {
    /// SQLite database URL or path.
    #[arg(long, env = "COURSE_DB_URL", default_value = "sqlite://dev.sqlite3", global = true)]
    db: String,
    /// Log filter directive, e.g. `info` or `services=debug`.
    #[arg(long, env = "RUST_LOG", default_value = "info", global = true)]
    log: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load demo categories, courses, students and progress.
    Seed {
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Enroll a student, registering them first when `--name` is given.
    Enroll {
        #[arg(long)]
        student: StudentId,
        #[arg(long)]
        course: CourseId,
        #[arg(long)]
        name: Option<String>,
    },
    /// List the courses a student is enrolled in.
    Courses {
        #[arg(long)]
        student: StudentId,
    },
    /// Show a course outline with lock state and progress.
    Outline {
        #[arg(long)]
        student: StudentId,
        #[arg(long)]
        course: CourseId,
        #[arg(long)]
        json: bool,
    },
    /// Report a video position or PDF page.
    Progress {
        #[arg(long)]
        student: StudentId,
        #[arg(long)]
        lesson: LessonId,
        #[arg(long, conflicts_with = "page")]
        time: Option<u32>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        complete: bool,
    },
    /// Mark a lesson as done.
    Complete {
        #[arg(long)]
        student: StudentId,
        #[arg(long)]
        lesson: LessonId,
    },
    /// Assign positions 1..n to the given lessons.
    Reorder {
        #[arg(long)]
        course: CourseId,
        #[arg(required = true, value_delimiter = ',')]
        lessons: Vec<LessonId>,
    },
}

fn init_log(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_log(&args.log);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(denied) = err
                .downcast_ref::<ProgressServiceError>()
                .and_then(ProgressServiceError::access_denied)
            {
                eprintln!("access denied: {denied}");
                return ExitCode::from(2);
            }
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    let db_url = normalize_sqlite_url(&args.db);
    prepare_sqlite_file(&db_url)?;
    let services = AppServices::new_sqlite(&db_url, Clock::system())
        .await
        .with_context(|| format!("opening {db_url}"))?;
    tracing::debug!(%db_url, "database ready");

    match args.command {
        Command::Seed { seed } => {
            let report = DemoLoader::new(services, seed).run().await?;
            if report.skipped {
                println!("database already has courses, nothing seeded");
                return Ok(());
            }
            println!(
                "seeded {} courses, {} lessons, {} students, {} enrollments",
                report.courses, report.lessons, report.students, report.enrollments
            );
        }
        Command::Enroll {
            student,
            course,
            name,
        } => {
            if let Some(name) = name {
                services.students().register_student(student, &name).await?;
            }
            let enrollment = services.enrollments().enroll(student, course).await?;
            println!(
                "student {} enrolled in course {} ({}, {:.1}%)",
                enrollment.student_id(),
                enrollment.course_id(),
                enrollment.status().as_str(),
                enrollment.progress_percent()
            );
        }
        Command::Courses { student } => {
            for row in services.enrollments().list_enrolled_courses(student).await? {
                println!(
                    "{:>4}  {:<32} {:>3}/{:<3} {:>5.1}%  {}",
                    row.course.id(),
                    row.course.title(),
                    row.completion.completed_lessons(),
                    row.completion.total_lessons(),
                    row.listing_percent(),
                    row.enrollment.status().as_str()
                );
            }
        }
        Command::Outline {
            student,
            course,
            json,
        } => {
            let outline = services.progress().course_outline(student, course).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outline)?);
                return Ok(());
            }
            println!(
                "course {}: {} {:.1}% ({}/{} lessons)",
                outline.course_id,
                outline.status.as_str(),
                outline.weighted_percent,
                outline.completed_lessons,
                outline.total_lessons
            );
            for item in &outline.lessons {
                let state = match (&item.progress, item.access.is_unlocked()) {
                    (Some(p), _) if p.is_completed() => "done",
                    (_, false) => "locked",
                    (Some(_), true) => "started",
                    (None, true) => "open",
                };
                println!(
                    "  {:>2}. [{:<7}] {:<40} {:>5.1}%  ({}, id {})",
                    item.lesson.position(),
                    state,
                    item.lesson.title(),
                    item.weight,
                    item.lesson.kind().as_str(),
                    item.lesson.id()
                );
            }
        }
        Command::Progress {
            student,
            lesson,
            time,
            page,
            complete,
        } => {
            let update = ProgressUpdate {
                current_time_seconds: time,
                current_page: page,
                complete,
            };
            let record = services
                .progress()
                .update_progress(student, lesson, update)
                .await?;
            print_progress(&record);
        }
        Command::Complete { student, lesson } => {
            let record = services
                .progress()
                .mark_lesson_complete(student, lesson)
                .await?;
            print_progress(&record);
        }
        Command::Reorder { course, lessons } => {
            for lesson in services.catalog().reorder(course, &lessons).await? {
                println!("{:>3}  {}  {}", lesson.position(), lesson.id(), lesson.title());
            }
        }
    }
    Ok(())
}

fn print_progress(record: &Progress) {
    let position = match (record.current_time_seconds(), record.current_page()) {
        (Some(seconds), _) => format!("at {seconds}s"),
        (None, Some(page)) => format!("on page {page}"),
        (None, None) => "not started".to_owned(),
    };
    let state = if record.is_completed() {
        "completed"
    } else {
        "in progress"
    };
    println!("lesson {}: {state}, {position}", record.lesson_id());
}
