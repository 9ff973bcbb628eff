// tests/api_tests.rs

use std::sync::Arc;

use quiz_backend::{
    config::Config,
    models::actor::Role,
    routes,
    state::AppState,
    store::MemoryStore,
    utils::jwt::sign_jwt,
};
use serde_json::{Value, json};

const SECRET: &str = "test_secret_for_integration_tests";
const TEACHER: &str = "teacher-1";
const STUDENT: &str = "student-1";
const SUBJECT: &str = "biology";

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345") and the backing store.
async fn spawn_app() -> (String, MemoryStore) {
    let store = MemoryStore::new();
    store.enroll(STUDENT, SUBJECT).await;

    let config = Config {
        database_url: None,
        database_max_connections: 1,
        jwt_secret: SECRET.to_string(),
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
    };

    let state = AppState {
        store: Arc::new(store.clone()),
        config,
    };
    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, store)
}

fn token(id: &str, role: Role) -> String {
    format!("Bearer {}", sign_jwt(id, role, SECRET, 600).unwrap())
}

fn contains_key(value: &Value, key: &str) -> bool {
    match value {
        Value::Object(map) => map.contains_key(key) || map.values().any(|v| contains_key(v, key)),
        Value::Array(items) => items.iter().any(|v| contains_key(v, key)),
        _ => false,
    }
}

/// Creates and publishes a quiz with one 2-point MCQ (correct "B") and,
/// optionally, one 3-point essay. Returns (quiz_id, correct_option_id).
async fn publish_quiz(client: &reqwest::Client, address: &str, with_essay: bool) -> (String, String) {
    let teacher = token(TEACHER, Role::Teacher);

    let quiz: Value = client
        .post(format!("{}/api/quizzes", address))
        .header("Authorization", &teacher)
        .json(&json!({
            "subject_id": SUBJECT,
            "title": "Cells",
            "passing_score": 50,
            "time_limit_minutes": 30,
            "shuffle_questions": true,
            "shuffle_answers": true
        }))
        .send()
        .await
        .expect("Create quiz failed")
        .json()
        .await
        .unwrap();
    let quiz_id = quiz["id"].as_str().unwrap().to_string();
    assert_eq!(quiz["status"], "DRAFT");

    let question: Value = client
        .post(format!("{}/api/quizzes/{}/questions", address, quiz_id))
        .header("Authorization", &teacher)
        .json(&json!({
            "question_type": "MULTIPLE_CHOICE",
            "prompt": "Which organelle makes ATP?",
            "points": 2,
            "options": [
                { "text": "Nucleus" },
                { "text": "Mitochondria", "is_correct": true },
                { "text": "Ribosome" }
            ]
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let correct = question["options"]
        .as_array()
        .unwrap()
        .iter()
        .find(|o| o["is_correct"] == true)
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    if with_essay {
        let response = client
            .post(format!("{}/api/quizzes/{}/questions", address, quiz_id))
            .header("Authorization", &teacher)
            .json(&json!({
                "question_type": "ESSAY",
                "prompt": "Explain osmosis.",
                "points": 3,
                "word_limit": 200
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
    }

    let response = client
        .put(format!("{}/api/quizzes/{}/status", address, quiz_id))
        .header("Authorization", &teacher)
        .json(&json!({ "status": "PUBLISHED" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    (quiz_id, correct)
}

#[tokio::test]
async fn unknown_route_404() {
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .header("Authorization", token(STUDENT, Role::Student))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn missing_token_is_rejected() {
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/quizzes/whatever/attempts", address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "unauthorized");

    let response = client
        .get(format!("{}/api/quizzes/whatever", address))
        .header("Authorization", "Bearer not-a-jwt")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "unauthorized");
}

#[tokio::test]
async fn malformed_body_is_a_validation_error() {
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();
    let (quiz_id, _) = publish_quiz(&client, &address, false).await;
    let student = token(STUDENT, Role::Student);

    let started: Value = client
        .post(format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .header("Authorization", &student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let attempt_id = started["attempt"]["id"].as_str().unwrap();
    let question_id = started["questions"][0]["id"].as_str().unwrap();

    let response = client
        .post(format!("{}/api/attempts/{}/submit", address, attempt_id))
        .header("Authorization", &student)
        .json(&json!({
            "answers": [{ "question_id": question_id, "answer": { "type": "drawing" } }]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "validation_failed");

    // Body without a JSON content type
    let response = client
        .post(format!("{}/api/attempts/{}/submit", address, attempt_id))
        .header("Authorization", &student)
        .body("answers")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "validation_failed");

    // The rejected requests left the attempt open.
    let submit = client
        .post(format!("{}/api/attempts/{}/submit", address, attempt_id))
        .header("Authorization", &student)
        .json(&json!({ "answers": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(submit.status().as_u16(), 200);
}

#[tokio::test]
async fn create_quiz_fails_validation() {
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/quizzes", address))
        .header("Authorization", token(TEACHER, Role::Teacher))
        .json(&json!({ "subject_id": SUBJECT, "title": "", "passing_score": 150 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "validation_failed");
}

#[tokio::test]
async fn students_cannot_author_quizzes() {
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/quizzes", address))
        .header("Authorization", token(STUDENT, Role::Student))
        .json(&json!({ "subject_id": SUBJECT, "title": "Mine", "passing_score": 50 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn auto_graded_quiz_flow() {
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();
    let (quiz_id, correct) = publish_quiz(&client, &address, false).await;
    let student = token(STUDENT, Role::Student);

    // 1. Start
    let start = client
        .post(format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .header("Authorization", &student)
        .send()
        .await
        .unwrap();
    assert_eq!(start.status().as_u16(), 201);
    let started: Value = start.json().await.unwrap();
    assert!(!contains_key(&started, "is_correct"));
    assert_eq!(started["resumed"], false);
    assert!(started["deadline"].is_string());
    let attempt_id = started["attempt"]["id"].as_str().unwrap().to_string();

    // 2. Resume returns the same attempt
    let resume = client
        .post(format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .header("Authorization", &student)
        .send()
        .await
        .unwrap();
    assert_eq!(resume.status().as_u16(), 200);
    let resumed: Value = resume.json().await.unwrap();
    assert_eq!(resumed["attempt"]["id"], attempt_id.as_str());
    assert!(!contains_key(&resumed, "is_correct"));

    // 3. Submit
    let question_id = started["questions"][0]["id"].as_str().unwrap();
    let submit = client
        .post(format!("{}/api/attempts/{}/submit", address, attempt_id))
        .header("Authorization", &student)
        .json(&json!({
            "answers": [
                { "question_id": question_id, "answer": { "type": "selected_option", "option_id": correct } }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(submit.status().as_u16(), 200);
    let result: Value = submit.json().await.unwrap();
    assert_eq!(result["view"], "results");
    assert_eq!(result["attempt"]["status"], "GRADED");
    assert_eq!(result["attempt"]["score"], 2);
    assert_eq!(result["attempt"]["percentage"], 100.0);
    assert_eq!(result["attempt"]["is_passed"], true);

    // 4. No second attempt
    let again = client
        .post(format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .header("Authorization", &student)
        .send()
        .await
        .unwrap();
    assert_eq!(again.status().as_u16(), 409);
    let body: Value = again.json().await.unwrap();
    assert_eq!(body["kind"], "already_completed");
    assert_eq!(body["attempt_id"], attempt_id.as_str());

    // 5. No re-submission
    let resubmit = client
        .post(format!("{}/api/attempts/{}/submit", address, attempt_id))
        .header("Authorization", &student)
        .json(&json!({ "answers": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resubmit.status().as_u16(), 409);
}

#[tokio::test]
async fn essay_quiz_flow_with_manual_grading() {
    let (address, store) = spawn_app().await;
    let client = reqwest::Client::new();
    let (quiz_id, correct) = publish_quiz(&client, &address, true).await;
    let student = token(STUDENT, Role::Student);
    let teacher = token(TEACHER, Role::Teacher);

    let started: Value = client
        .post(format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .header("Authorization", &student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let attempt_id = started["attempt"]["id"].as_str().unwrap().to_string();

    let mut answers = Vec::new();
    for q in started["questions"].as_array().unwrap() {
        let id = q["id"].as_str().unwrap();
        if q["question_type"] == "ESSAY" {
            answers.push(json!({ "question_id": id, "answer": { "type": "text", "text": "Water moves across a membrane." } }));
        } else {
            answers.push(json!({ "question_id": id, "answer": { "type": "selected_option", "option_id": correct } }));
        }
    }

    let submitted: Value = client
        .post(format!("{}/api/attempts/{}/submit", address, attempt_id))
        .header("Authorization", &student)
        .json(&json!({ "answers": answers, "time_spent_seconds": 95 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(submitted["view"], "receipt");
    assert_eq!(submitted["status"], "SUBMITTED");
    assert!(!contains_key(&submitted, "score"));

    // Results are withheld until grading completes.
    let withheld = client
        .get(format!("{}/api/attempts/{}", address, attempt_id))
        .header("Authorization", &student)
        .send()
        .await
        .unwrap();
    assert_eq!(withheld.status().as_u16(), 403);
    let body: Value = withheld.json().await.unwrap();
    assert_eq!(body["kind"], "results_not_available");

    // Teacher sees the pending essay.
    let listed: Value = client
        .get(format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .header("Authorization", &teacher)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed[0]["pending_grading"], 1);
    assert_eq!(listed[0]["score"], 2);
    assert_eq!(listed[0]["is_passed"], Value::Null);

    let detail: Value = client
        .get(format!("{}/api/attempts/{}", address, attempt_id))
        .header("Authorization", &teacher)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let essay_answer_id = detail["questions"]
        .as_array()
        .unwrap()
        .iter()
        .find(|g| g["question"]["question_type"] == "ESSAY")
        .unwrap()["answer"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    // Over the maximum: rejected, nothing changes.
    let too_many = client
        .put(format!("{}/api/answers/{}/grade", address, essay_answer_id))
        .header("Authorization", &teacher)
        .json(&json!({ "points_awarded": 10 }))
        .send()
        .await
        .unwrap();
    assert_eq!(too_many.status().as_u16(), 422);
    let body: Value = too_many.json().await.unwrap();
    assert_eq!(body["kind"], "out_of_range");

    let graded: Value = client
        .put(format!("{}/api/answers/{}/grade", address, essay_answer_id))
        .header("Authorization", &teacher)
        .json(&json!({ "points_awarded": 3, "feedback": "Clear and correct." }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(graded["attempt"]["status"], "GRADED");
    assert_eq!(graded["attempt"]["score"], 5);
    assert_eq!(graded["attempt"]["percentage"], 100.0);
    assert_eq!(graded["attempt"]["is_passed"], true);

    let results = client
        .get(format!("{}/api/attempts/{}", address, attempt_id))
        .header("Authorization", &student)
        .send()
        .await
        .unwrap();
    assert_eq!(results.status().as_u16(), 200);
    let results: Value = results.json().await.unwrap();
    assert_eq!(results["attempt"]["time_spent_seconds"], 95);

    let stored = quiz_backend::store::EntityStore::find_attempt_by_id(&store, &attempt_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.is_passed, Some(true));
}

#[tokio::test]
async fn student_quiz_preview_is_redacted() {
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();
    let (quiz_id, _) = publish_quiz(&client, &address, true).await;

    let preview: Value = client
        .get(format!("{}/api/quizzes/{}", address, quiz_id))
        .header("Authorization", token(STUDENT, Role::Student))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(preview["view"], "preview");
    assert_eq!(preview["question_count"], 2);
    assert!(!contains_key(&preview, "is_correct"));

    let full: Value = client
        .get(format!("{}/api/quizzes/{}", address, quiz_id))
        .header("Authorization", token(TEACHER, Role::Teacher))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(full["view"], "full");
    assert!(contains_key(&full, "is_correct"));

    let outsider = client
        .get(format!("{}/api/quizzes/{}", address, quiz_id))
        .header("Authorization", token("teacher-2", Role::Teacher))
        .send()
        .await
        .unwrap();
    assert_eq!(outsider.status().as_u16(), 403);
}

#[tokio::test]
async fn published_quiz_rejects_new_questions() {
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();
    let (quiz_id, _) = publish_quiz(&client, &address, false).await;

    let response = client
        .post(format!("{}/api/quizzes/{}/questions", address, quiz_id))
        .header("Authorization", token(TEACHER, Role::Teacher))
        .json(&json!({ "question_type": "ESSAY", "prompt": "Late addition", "points": 1 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "invalid_state");
}

#[tokio::test]
async fn unenrolled_student_cannot_start() {
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();
    let (quiz_id, _) = publish_quiz(&client, &address, false).await;

    let response = client
        .post(format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .header("Authorization", token("student-9", Role::Student))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 403);
}
