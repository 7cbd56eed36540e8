use course_core::model::{
    CourseId, LearningStatus, LessonContent, LessonId, ProgressUpdate, StudentId,
};
use course_core::time::fixed_now;
use services::{AccessDenied, AppServices, Clock, ProgressServiceError};

struct Course {
    services: AppServices,
    student: StudentId,
    course: CourseId,
    lessons: Vec<LessonId>,
}

async fn course_with(db: &str, contents: &[LessonContent]) -> Course {
    let url = format!("sqlite:file:{db}?mode=memory&cache=shared");
    let services = AppServices::new_sqlite(&url, Clock::fixed(fixed_now()))
        .await
        .expect("connect sqlite");

    let student = StudentId::new(1);
    services
        .students()
        .register_student(student, "Student One")
        .await
        .expect("register student");
    let course = services
        .courses()
        .create_course("Systems Programming", None, None)
        .await
        .expect("create course")
        .id();

    let mut lessons = Vec::new();
    for (i, content) in contents.iter().enumerate() {
        let lesson = services
            .catalog()
            .add_lesson(course, &format!("Lesson {}", i + 1), *content)
            .await
            .expect("add lesson");
        lessons.push(lesson.id());
    }
    services
        .enrollments()
        .enroll(student, course)
        .await
        .expect("enroll");

    Course {
        services,
        student,
        course,
        lessons,
    }
}

#[tokio::test]
async fn decreasing_positions_never_lower_the_stored_value() {
    let c = course_with("memdb_flow_monotonic", &[LessonContent::video(Some(1_000))]).await;
    let progress = c.services.progress();

    let mut last = 0;
    for seconds in [30, 400, 200, 401, 0, 650] {
        let record = progress
            .update_progress(c.student, c.lessons[0], ProgressUpdate::video_position(seconds))
            .await
            .expect("update");
        let stored = record.current_time_seconds().unwrap_or_default();
        assert!(stored >= last);
        last = stored;
    }
    assert_eq!(last, 650);
}

#[tokio::test]
async fn completed_record_is_terminal() {
    let c = course_with("memdb_flow_terminal", &[LessonContent::pdf(Some(10))]).await;
    let progress = c.services.progress();

    let done = progress
        .update_progress(c.student, c.lessons[0], ProgressUpdate::pdf_page(10))
        .await
        .expect("finish");
    assert!(done.is_completed());

    let after = progress
        .update_progress(c.student, c.lessons[0], ProgressUpdate::pdf_page(3))
        .await
        .expect("late update");
    assert_eq!(after, done);
}

#[tokio::test]
async fn video_end_tolerance_is_five_seconds() {
    let c = course_with(
        "memdb_flow_video_boundary",
        &[LessonContent::video(Some(100)), LessonContent::video(Some(100))],
    )
    .await;
    let progress = c.services.progress();

    let open = progress
        .update_progress(c.student, c.lessons[0], ProgressUpdate::video_position(94))
        .await
        .expect("94s");
    assert!(!open.is_completed());

    let done = progress
        .update_progress(c.student, c.lessons[0], ProgressUpdate::video_position(95))
        .await
        .expect("95s");
    assert!(done.is_completed());
}

#[tokio::test]
async fn weighted_percent_and_status_follow_the_roll_up() {
    let c = course_with(
        "memdb_flow_rollup",
        &[
            LessonContent::video(Some(60)),
            LessonContent::pdf(Some(5)),
            LessonContent::video(Some(200)),
            LessonContent::pdf(Some(8)),
        ],
    )
    .await;
    let progress = c.services.progress();

    let outline = progress
        .course_outline(c.student, c.course)
        .await
        .expect("outline");
    assert_eq!(outline.status, LearningStatus::NotStarted);

    progress
        .mark_lesson_complete(c.student, c.lessons[0])
        .await
        .expect("complete 1");
    progress
        .mark_lesson_complete(c.student, c.lessons[1])
        .await
        .expect("complete 2");
    progress
        .update_progress(c.student, c.lessons[2], ProgressUpdate::video_position(100))
        .await
        .expect("half of 3");

    let enrollment = c
        .services
        .enrollments()
        .get_enrollment(c.student, c.course)
        .await
        .expect("read enrollment")
        .expect("enrolled");
    assert!((enrollment.progress_percent() - 37.5).abs() < 1e-9);
    assert_eq!(enrollment.status(), LearningStatus::InProgress);

    let listing = c
        .services
        .enrollments()
        .list_enrolled_courses(c.student)
        .await
        .expect("listing");
    assert_eq!(listing.len(), 1);
    assert!((listing[0].listing_percent() - 50.0).abs() < 1e-9);
}

#[tokio::test]
async fn course_completes_only_when_every_lesson_is_done() {
    let c = course_with(
        "memdb_flow_completed_status",
        &[LessonContent::pdf(Some(1)), LessonContent::video(Some(10_000))],
    )
    .await;
    let progress = c.services.progress();

    progress
        .mark_lesson_complete(c.student, c.lessons[0])
        .await
        .expect("complete 1");
    progress
        .update_progress(c.student, c.lessons[1], ProgressUpdate::video_position(9_900))
        .await
        .expect("almost 2");

    let outline = progress
        .course_outline(c.student, c.course)
        .await
        .expect("outline");
    assert!(outline.weighted_percent >= 99.0);
    assert_eq!(outline.status, LearningStatus::InProgress);

    progress
        .mark_lesson_complete(c.student, c.lessons[1])
        .await
        .expect("complete 2");
    let outline = progress
        .course_outline(c.student, c.course)
        .await
        .expect("outline");
    assert_eq!(outline.status, LearningStatus::Completed);
}

#[tokio::test]
async fn lessons_unlock_one_after_another() {
    let c = course_with(
        "memdb_flow_unlock",
        &[
            LessonContent::pdf(Some(2)),
            LessonContent::pdf(Some(2)),
            LessonContent::pdf(Some(2)),
        ],
    )
    .await;
    let progress = c.services.progress();

    progress
        .mark_lesson_complete(c.student, c.lessons[0])
        .await
        .expect("complete 1");

    let outline = progress
        .course_outline(c.student, c.course)
        .await
        .expect("outline");
    let unlocked: Vec<bool> = outline
        .lessons
        .iter()
        .map(|item| item.access.is_unlocked())
        .collect();
    assert_eq!(unlocked, vec![true, true, false]);

    progress
        .open_lesson(c.student, c.lessons[1])
        .await
        .expect("lesson 2 is open");
    let err = progress
        .open_lesson(c.student, c.lessons[2])
        .await
        .expect_err("lesson 3 is locked");
    assert_eq!(
        err.access_denied(),
        Some(AccessDenied::LessonLocked {
            lesson_id: c.lessons[2],
            blocked_by: c.lessons[1],
        })
    );
}

#[tokio::test]
async fn mark_complete_twice_matches_once() {
    let c = course_with("memdb_flow_idempotent", &[LessonContent::video(Some(30))]).await;
    let progress = c.services.progress();

    let once = progress
        .mark_lesson_complete(c.student, c.lessons[0])
        .await
        .expect("first");
    let twice = progress
        .mark_lesson_complete(c.student, c.lessons[0])
        .await
        .expect("second");
    assert_eq!(once, twice);
}

#[tokio::test]
async fn not_enrolled_student_is_turned_away() {
    let c = course_with("memdb_flow_not_enrolled", &[LessonContent::pdf(Some(4))]).await;
    let outsider = StudentId::new(2);
    c.services
        .students()
        .register_student(outsider, "Outsider")
        .await
        .expect("register");

    let err = c
        .services
        .progress()
        .update_progress(outsider, c.lessons[0], ProgressUpdate::pdf_page(1))
        .await
        .expect_err("not enrolled");
    assert!(matches!(
        err,
        ProgressServiceError::Forbidden(AccessDenied::NotEnrolled { course_id }) if course_id == c.course
    ));

    let err = c
        .services
        .progress()
        .open_lesson(c.student, LessonId::new(9_999))
        .await
        .expect_err("missing lesson");
    assert!(matches!(err, ProgressServiceError::NotFound("lesson")));
}

#[tokio::test]
async fn unenroll_drops_progress_and_reenroll_starts_over() {
    let c = course_with("memdb_flow_unenroll", &[LessonContent::pdf(Some(4))]).await;
    let progress = c.services.progress();
    let enrollments = c.services.enrollments();

    progress
        .update_progress(c.student, c.lessons[0], ProgressUpdate::pdf_page(2))
        .await
        .expect("update");
    enrollments
        .unenroll(c.student, c.course)
        .await
        .expect("unenroll");
    enrollments
        .enroll(c.student, c.course)
        .await
        .expect("re-enroll");

    let outline = progress
        .course_outline(c.student, c.course)
        .await
        .expect("outline");
    assert_eq!(outline.status, LearningStatus::NotStarted);
    assert!(outline.lessons[0].progress.is_none());
    assert!(outline.weighted_percent.abs() < f64::EPSILON);
}

#[tokio::test]
async fn pdf_completes_on_the_last_page_only() {
    let c = course_with("memdb_flow_pdf_boundary", &[LessonContent::pdf(Some(10))]).await;
    let progress = c.services.progress();

    let open = progress
        .update_progress(c.student, c.lessons[0], ProgressUpdate::pdf_page(9))
        .await
        .expect("page 9");
    assert!(!open.is_completed());
    assert_eq!(open.current_page(), Some(9));

    let done = progress
        .update_progress(c.student, c.lessons[0], ProgressUpdate::pdf_page(10))
        .await
        .expect("page 10");
    assert!(done.is_completed());

    // A late report from another tab changes nothing, roll-up included.
    progress
        .update_progress(c.student, c.lessons[0], ProgressUpdate::pdf_page(3))
        .await
        .expect("late page");
    let enrollment = c
        .services
        .enrollments()
        .get_enrollment(c.student, c.course)
        .await
        .expect("read enrollment")
        .expect("enrolled");
    assert_eq!(enrollment.status(), LearningStatus::Completed);
    assert!((enrollment.progress_percent() - 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn reorder_moves_the_unlock_chain() {
    let c = course_with(
        "memdb_flow_reorder_unlock",
        &[
            LessonContent::pdf(Some(2)),
            LessonContent::pdf(Some(2)),
            LessonContent::pdf(Some(2)),
        ],
    )
    .await;
    let progress = c.services.progress();
    let done = progress
        .mark_lesson_complete(c.student, c.lessons[0])
        .await
        .expect("complete 1");

    c.services
        .catalog()
        .reorder(c.course, &[c.lessons[2], c.lessons[0], c.lessons[1]])
        .await
        .expect("reorder");

    let outline = progress
        .course_outline(c.student, c.course)
        .await
        .expect("outline");
    let order: Vec<LessonId> = outline.lessons.iter().map(|item| item.lesson.id()).collect();
    assert_eq!(order, vec![c.lessons[2], c.lessons[0], c.lessons[1]]);
    let unlocked: Vec<bool> = outline
        .lessons
        .iter()
        .map(|item| item.access.is_unlocked())
        .collect();
    assert_eq!(unlocked, vec![true, false, true]);

    let err = progress
        .open_lesson(c.student, c.lessons[0])
        .await
        .expect_err("finished lesson now sits behind an open one");
    assert_eq!(
        err.access_denied(),
        Some(AccessDenied::LessonLocked {
            lesson_id: c.lessons[0],
            blocked_by: c.lessons[2],
        })
    );
    let again = progress
        .mark_lesson_complete(c.student, c.lessons[0])
        .await
        .expect("completed lesson stays a no-op");
    assert_eq!(again, done);
    progress
        .open_lesson(c.student, c.lessons[1])
        .await
        .expect("lesson after a finished one is open");
}

#[tokio::test]
async fn partial_reorder_falls_back_on_id_order() {
    let c = course_with(
        "memdb_flow_partial_reorder",
        &[
            LessonContent::pdf(Some(2)),
            LessonContent::pdf(Some(2)),
            LessonContent::pdf(Some(2)),
        ],
    )
    .await;
    let progress = c.services.progress();
    progress
        .mark_lesson_complete(c.student, c.lessons[0])
        .await
        .expect("complete 1");

    // Only lesson 3 moves; it now shares position 1 with lesson 1.
    c.services
        .catalog()
        .reorder(c.course, &[c.lessons[2]])
        .await
        .expect("reorder");

    let outline = progress
        .course_outline(c.student, c.course)
        .await
        .expect("outline");
    let order: Vec<LessonId> = outline.lessons.iter().map(|item| item.lesson.id()).collect();
    assert_eq!(order, vec![c.lessons[0], c.lessons[2], c.lessons[1]]);
    let unlocked: Vec<bool> = outline
        .lessons
        .iter()
        .map(|item| item.access.is_unlocked())
        .collect();
    assert_eq!(unlocked, vec![true, true, false]);
}

#[tokio::test]
async fn deleting_the_last_open_lesson_completes_the_course() {
    let c = course_with(
        "memdb_flow_delete_rollup",
        &[LessonContent::pdf(Some(4)), LessonContent::pdf(Some(4))],
    )
    .await;
    let progress = c.services.progress();
    let enrollments = c.services.enrollments();
    progress
        .mark_lesson_complete(c.student, c.lessons[0])
        .await
        .expect("complete 1");

    c.services
        .catalog()
        .delete_lesson(c.lessons[1])
        .await
        .expect("delete 2");

    let enrollment = enrollments
        .get_enrollment(c.student, c.course)
        .await
        .expect("read enrollment")
        .expect("enrolled");
    assert_eq!(enrollment.status(), LearningStatus::Completed);
    assert!((enrollment.progress_percent() - 100.0).abs() < 1e-9);
    let outline = progress
        .course_outline(c.student, c.course)
        .await
        .expect("outline");
    assert!((outline.weighted_percent - enrollment.progress_percent()).abs() < 1e-9);

    // New material lowers the percent; a finished course stays finished.
    c.services
        .catalog()
        .add_lesson(c.course, "Epilogue", LessonContent::pdf(Some(4)))
        .await
        .expect("add lesson");
    let enrollment = enrollments
        .get_enrollment(c.student, c.course)
        .await
        .expect("read enrollment")
        .expect("enrolled");
    assert_eq!(enrollment.status(), LearningStatus::Completed);
    assert!((enrollment.progress_percent() - 50.0).abs() < 1e-9);
}
