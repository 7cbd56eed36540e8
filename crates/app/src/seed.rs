//! Demo data for local development.
//!
//! Everything goes through the public services, so the generated records obey the
//! same ordering, unlock and roll-up rules as real traffic.

use anyhow::Context;
use course_core::model::{CourseId, LessonContent, LessonId, ProgressUpdate, StudentId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use services::AppServices;

const CATEGORIES: &[&str] = &["Programming", "Mathematics", "Languages"];

const COURSES: &[(&str, usize)] = &[
    ("Rust from Scratch", 0),
    ("Async Networking", 0),
    ("Linear Algebra Basics", 1),
    ("Spanish for Travellers", 2),
];

const STUDENTS: &[&str] = &["Ada", "Grace", "Linus", "Barbara", "Ken"];

/// What a seeding run produced.
#[derive(Debug, Default, Clone, Copy)]
pub struct SeedReport {
    /// The store already held courses, so nothing was written.
    pub skipped: bool,
    pub courses: usize,
    pub lessons: usize,
    pub students: usize,
    pub enrollments: usize,
    pub progress_updates: usize,
}

/// Fills a store with categories, courses, lessons, students and partial progress.
pub struct DemoLoader {
    services: AppServices,
    rng: StdRng,
}

impl DemoLoader {
    pub fn new(services: AppServices, seed: u64) -> Self {
        Self {
            services,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Load the demo data into an empty store. A store that already has courses is left alone.
    pub async fn run(mut self) -> anyhow::Result<SeedReport> {
        let mut report = SeedReport::default();
        if !self.services.courses().list_courses(1).await?.is_empty() {
            tracing::info!("store already has courses, skipping demo data");
            report.skipped = true;
            return Ok(report);
        }

        let mut category_ids = Vec::with_capacity(CATEGORIES.len());
        for name in CATEGORIES {
            let category = self
                .services
                .courses()
                .create_category(name)
                .await
                .with_context(|| format!("creating category {name}"))?;
            category_ids.push(category.id());
        }

        let mut courses: Vec<(CourseId, Vec<LessonId>)> = Vec::with_capacity(COURSES.len());
        for (title, category) in COURSES {
            let course = self
                .services
                .courses()
                .create_course(
                    title,
                    Some(format!("An introduction to {}.", title.to_lowercase())),
                    category_ids.get(*category).copied(),
                )
                .await
                .with_context(|| format!("creating course {title}"))?;
            let lessons = self.add_lessons(course.id()).await?;
            report.lessons += lessons.len();
            courses.push((course.id(), lessons));
        }
        report.courses = courses.len();

        for (index, name) in (1_u64..).zip(STUDENTS) {
            let student = StudentId::new(index);
            self.services
                .students()
                .register_student(student, name)
                .await
                .with_context(|| format!("registering {name}"))?;
            report.students += 1;

            for (course, lessons) in &courses {
                if !self.rng.random_bool(0.6) {
                    continue;
                }
                self.services.enrollments().enroll(student, *course).await?;
                report.enrollments += 1;
                report.progress_updates += self.walk_course(student, lessons).await?;
            }
        }

        tracing::info!(?report, "demo data loaded");
        Ok(report)
    }

    async fn add_lessons(&mut self, course: CourseId) -> anyhow::Result<Vec<LessonId>> {
        let count = self.rng.random_range(3..=6);
        let mut ids = Vec::with_capacity(count);
        for n in 1..=count {
            let content = if self.rng.random_bool(0.5) {
                LessonContent::video(Some(self.rng.random_range(120..=1_800)))
            } else {
                LessonContent::pdf(Some(self.rng.random_range(4..=40)))
            };
            let lesson = self
                .services
                .catalog()
                .add_lesson(course, &format!("Part {n}"), content)
                .await?;
            ids.push(lesson.id());
        }
        Ok(ids)
    }

    /// Finish a random prefix of the course and leave the next lesson half done.
    async fn walk_course(
        &mut self,
        student: StudentId,
        lessons: &[LessonId],
    ) -> anyhow::Result<usize> {
        let finished = self.rng.random_range(0..=lessons.len());
        let progress = self.services.progress();
        let mut updates = 0;

        for lesson in &lessons[..finished] {
            progress.mark_lesson_complete(student, *lesson).await?;
            updates += 1;
        }

        if let Some(next) = lessons.get(finished) {
            let Some(lesson) = self.services.catalog().get_lesson(*next).await? else {
                return Ok(updates);
            };
            let Some(total) = lesson.total_extent() else {
                return Ok(updates);
            };
            let position = self.rng.random_range(0..total.max(2) / 2);
            let update = match lesson.content() {
                LessonContent::Video { .. } => ProgressUpdate::video_position(position),
                LessonContent::Pdf { .. } => ProgressUpdate::pdf_page(position),
            };
            progress.update_progress(student, *next, update).await?;
            updates += 1;
        }
        Ok(updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use course_core::time::fixed_now;
    use services::Clock;

    #[tokio::test]
    async fn same_seed_gives_same_data() {
        let first = DemoLoader::new(AppServices::in_memory(Clock::fixed(fixed_now())), 7)
            .run()
            .await
            .unwrap();
        let second = DemoLoader::new(AppServices::in_memory(Clock::fixed(fixed_now())), 7)
            .run()
            .await
            .unwrap();

        assert_eq!(first.lessons, second.lessons);
        assert_eq!(first.enrollments, second.enrollments);
        assert_eq!(first.progress_updates, second.progress_updates);
        assert_eq!(first.courses, COURSES.len());
        assert_eq!(first.students, STUDENTS.len());
    }

    #[tokio::test]
    async fn second_run_leaves_existing_data_alone() {
        let services = AppServices::in_memory(Clock::fixed(fixed_now()));
        let first = DemoLoader::new(services.clone(), 3).run().await.unwrap();
        assert!(!first.skipped);

        let second = DemoLoader::new(services.clone(), 3).run().await.unwrap();
        assert!(second.skipped);
        assert_eq!(second.courses, 0);

        let courses = services.courses().list_courses(100).await.unwrap();
        assert_eq!(courses.len(), COURSES.len());
        let categories = services.courses().list_categories().await.unwrap();
        assert_eq!(categories.len(), CATEGORIES.len());
    }

    #[tokio::test]
    async fn seeded_progress_respects_unlocking() {
        let services = AppServices::in_memory(Clock::fixed(fixed_now()));
        DemoLoader::new(services.clone(), 42).run().await.unwrap();

        for id in 1..=STUDENTS.len() as u64 {
            let student = StudentId::new(id);
            for row in services
                .enrollments()
                .list_enrolled_courses(student)
                .await
                .unwrap()
            {
                let outline = services
                    .progress()
                    .course_outline(student, row.course.id())
                    .await
                    .unwrap();
                for item in &outline.lessons {
                    if item.progress.is_some() {
                        assert!(item.access.is_unlocked());
                    }
                }
            }
        }
    }
}
