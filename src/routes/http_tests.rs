// src/routes/http_tests.rs
// HTTP integration tests: drive the mounted routes through Rocket's local client.
// Covers route registration, managed state, status codes and JSON shapes,
// which the repository unit tests cannot see.

use crate::build_rocket;
use crate::config::Config;
use crate::state::AppState;
use rocket::http::{ContentType, Status};
use rocket::local::blocking::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

const BOUNDARY: &str = "khazad-test-boundary";

struct Harness {
    client: Client,
    state: AppState,
    _home: TempDir,
}

fn harness() -> Harness {
    let home = tempfile::tempdir().unwrap();
    let config = Config {
        exif_tool: None,
        thumb_size: (32, 32),
        halfres_size: (64, 64),
        ..Config::default()
    };
    let state = AppState::new(home.path(), config);
    let client = Client::tracked(build_rocket(state.clone()).unwrap()).unwrap();
    Harness {
        client,
        state,
        _home: home,
    }
}

fn jpeg_bytes(width: u32, height: u32, shade: u8) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([shade, 40, 90]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Jpeg)
        .unwrap();
    out.into_inner()
}

fn multipart_body(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\n\
                 Content-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\n\
                 Content-Type: image/jpeg\r\n\r\n",
                BOUNDARY, name
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn post_multipart(h: &Harness, uri: &str, body: Vec<u8>) -> (Status, Value) {
    let content_type =
        ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY));
    let response = h
        .client
        .post(uri.to_string())
        .header(content_type)
        .body(body)
        .dispatch();
    let status = response.status();
    (status, response.into_json::<Value>().unwrap_or(Value::Null))
}

fn upload_to(h: &Harness, uri: &str, files: &[(&str, Vec<u8>)]) -> (Status, Value) {
    post_multipart(h, uri, multipart_body(files))
}

/// Upload one picture and return its id.
fn upload_one(h: &Harness, name: &str, shade: u8) -> i64 {
    let (status, report) =
        upload_to(h, "/api/pictures/upload", &[(name, jpeg_bytes(80, 40, shade))]);
    assert_eq!(status, Status::Ok);
    report["created"][0].as_i64().unwrap()
}

fn get_json(h: &Harness, uri: &str) -> (Status, Value) {
    let response = h.client.get(uri.to_string()).dispatch();
    let status = response.status();
    (status, response.into_json::<Value>().unwrap_or(Value::Null))
}

fn send_json(
    h: &Harness,
    method: rocket::http::Method,
    uri: &str,
    body: Value,
) -> (Status, Value) {
    let response = h
        .client
        .req(method, uri.to_string())
        .header(ContentType::JSON)
        .body(body.to_string())
        .dispatch();
    let status = response.status();
    (status, response.into_json::<Value>().unwrap_or(Value::Null))
}

fn post_json(h: &Harness, uri: &str, body: Value) -> (Status, Value) {
    send_json(h, rocket::http::Method::Post, uri, body)
}

fn create_species(h: &Harness, name: &str, scientific_name: &str) -> i64 {
    let (status, body) = post_json(
        h,
        "/api/species",
        json!({ "name": name, "scientific_name": scientific_name }),
    );
    assert_eq!(status, Status::Created);
    body["id"].as_i64().unwrap()
}

#[test]
fn test_alive() {
    let h = harness();
    let (status, body) = get_json(&h, "/alive");
    assert_eq!(status, Status::Ok);
    assert_eq!(body, json!({ "alive": "yes" }));
}

#[test]
fn test_upload_then_fetch_meta_and_files() {
    let h = harness();
    let id = upload_one(&h, "DSC_0001.jpg", 10);

    let (status, meta) = get_json(&h, &format!("/api/pictures/{}", id));
    assert_eq!(status, Status::Ok);
    assert!(meta["path"].as_str().unwrap().ends_with(".jpg"));
    assert_eq!(meta["stared"], json!(false));
    assert_eq!(meta["landscape"], json!(true));
    assert_eq!(meta["species"], Value::Null);

    let (status, same) = get_json(&h, &format!("/api/pictures/{}/meta", id));
    assert_eq!(status, Status::Ok);
    assert_eq!(same, meta);

    for data_type in ["full_file", "thumb_file", "halfres_file"] {
        let response = h
            .client
            .get(format!("/api/pictures/{}/{}", id, data_type))
            .dispatch();
        assert_eq!(response.status(), Status::Ok, "{}", data_type);
        let bytes = response.into_bytes().unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}

#[test]
fn test_unknown_data_type_and_missing_picture() {
    let h = harness();
    let id = upload_one(&h, "a.jpg", 1);

    let (status, body) = get_json(&h, &format!("/api/pictures/{}/raw_file", id));
    assert_eq!(status, Status::BadRequest);
    assert!(body["detail"].is_string());

    let (status, body) = get_json(&h, "/api/pictures/999");
    assert_eq!(status, Status::NotFound);
    assert_eq!(body["detail"], json!("picture not found"));
}

#[test]
fn test_duplicate_upload_reported_and_not_stored_twice() {
    let h = harness();
    let bytes = jpeg_bytes(60, 30, 77);
    let (_, first) = upload_to(&h, "/api/pictures/upload", &[("a.jpg", bytes.clone())]);
    assert_eq!(first["created"].as_array().unwrap().len(), 1);

    let (status, second) = upload_to(
        &h,
        "/api/pictures/upload",
        &[("renamed.jpg", bytes), ("other.jpg", jpeg_bytes(60, 30, 5))],
    );
    assert_eq!(status, Status::Ok);
    assert_eq!(second["duplicates"], json!(["renamed.jpg"]));
    assert_eq!(second["created"].as_array().unwrap().len(), 1);

    let (_, stats) = get_json(&h, "/api/pictures/stats");
    let total: u64 = stats["dates"]
        .as_object()
        .unwrap()
        .values()
        .map(|v| v.as_u64().unwrap())
        .sum();
    assert_eq!(total, 2);
}

#[test]
fn test_upload_without_files_is_rejected() {
    let h = harness();
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{b}--\r\n",
        b = BOUNDARY
    );
    let (status, body) = post_multipart(&h, "/api/pictures/upload", body.into_bytes());
    assert_eq!(status, Status::BadRequest);
    assert!(body["detail"].is_string());
    assert_eq!(std::fs::read_dir(&h.state.layout.staging).unwrap().count(), 0);
}

#[test]
fn test_extension_case_does_not_defeat_dedup() {
    let h = harness();
    let bytes = jpeg_bytes(50, 25, 33);
    let (_, first) = upload_to(&h, "/api/pictures/upload", &[("a.jpg", bytes.clone())]);
    let id = first["created"][0].as_i64().unwrap();

    let (status, second) = upload_to(&h, "/api/pictures/upload", &[("a.JPG", bytes)]);
    assert_eq!(status, Status::Ok);
    assert_eq!(second["created"], json!([]));
    assert_eq!(second["duplicates"], json!(["a.JPG"]));

    let (_, meta) = get_json(&h, &format!("/api/pictures/{}", id));
    assert!(meta["path"].as_str().unwrap().ends_with(".jpg"));
    assert_eq!(std::fs::read_dir(&h.state.layout.pictures).unwrap().count(), 1);
}

#[test]
fn test_upload_with_species() {
    let h = harness();
    let (status, body) = upload_to(
        &h,
        "/api/pictures/upload/species-id/42",
        &[("a.jpg", jpeg_bytes(40, 20, 3))],
    );
    assert_eq!(status, Status::NotFound);
    assert!(body["detail"].as_str().unwrap().contains("42"));
    assert_eq!(std::fs::read_dir(&h.state.layout.pictures).unwrap().count(), 0);

    let species_id = create_species(&h, "Grue cendrée", "Grus grus");
    let (status, report) = upload_to(
        &h,
        &format!("/api/pictures/upload/species-id/{}", species_id),
        &[("a.jpg", jpeg_bytes(40, 20, 3))],
    );
    assert_eq!(status, Status::Ok);
    let id = report["created"][0].as_i64().unwrap();
    let (_, meta) = get_json(&h, &format!("/api/pictures/{}", id));
    assert_eq!(meta["species"]["name"], json!("Grue cendrée"));
}

#[test]
fn test_toggle_star_twice_restores_value() {
    let h = harness();
    let id = upload_one(&h, "a.jpg", 1);
    let uri = format!("/api/pictures/{}/togglestar", id);

    let (_, on) = post_json(&h, &uri, Value::Null);
    assert_eq!(on["stared"], json!(true));
    let (_, favourites) = get_json(&h, "/api/pictures/favories");
    assert_eq!(favourites.as_array().unwrap().len(), 1);

    let (_, off) = post_json(&h, &uri, Value::Null);
    assert_eq!(off["stared"], json!(false));

    let (_, blurred) = post_json(&h, &format!("/api/pictures/{}/toggleblur", id), Value::Null);
    assert_eq!(blurred["blured"], json!(true));
    assert_eq!(blurred["stared"], json!(false));

    let (status, _) = post_json(&h, "/api/pictures/999/togglestar", Value::Null);
    assert_eq!(status, Status::NotFound);
}

#[test]
fn test_random_landscape_serves_starred_halfres() {
    let h = harness();
    let (status, _) = get_json(&h, "/api/pictures/random-landscape");
    assert_eq!(status, Status::NotFound);

    let id = upload_one(&h, "a.jpg", 1);
    post_json(&h, &format!("/api/pictures/{}/togglestar", id), Value::Null);
    let response = h.client.get("/api/pictures/random-landscape").dispatch();
    assert_eq!(response.status(), Status::Ok);
    let bytes = response.into_bytes().unwrap();
    let img = image::load_from_memory(&bytes).unwrap();
    assert_eq!((img.width(), img.height()), (64, 32));
}

#[test]
fn test_assign_and_clear_species() {
    let h = harness();
    let id = upload_one(&h, "a.jpg", 1);
    let species_id = create_species(&h, "Buse", "Buteo buteo");

    let (status, _) = post_json(&h, &format!("/api/pictures/{}/species/999", id), Value::Null);
    assert_eq!(status, Status::NotFound);

    let (status, picture) = post_json(
        &h,
        &format!("/api/pictures/{}/species/{}", id, species_id),
        Value::Null,
    );
    assert_eq!(status, Status::Ok);
    assert_eq!(picture["species"]["id"], json!(species_id));

    let (_, with_pictures) = get_json(&h, "/api/species/Buse");
    assert_eq!(with_pictures["pictures"].as_array().unwrap().len(), 1);

    let response = h
        .client
        .delete(format!("/api/pictures/{}/species", id))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let cleared: Value = response.into_json().unwrap();
    assert_eq!(cleared["species"], Value::Null);
}

#[test]
fn test_filtered_listing_and_filter_options() {
    let h = harness();
    upload_one(&h, "a.jpg", 1);
    upload_one(&h, "b.jpg", 2);

    let (status, all) = post_json(&h, "/api/pictures", json!({}));
    assert_eq!(status, Status::Ok);
    assert_eq!(all.as_array().unwrap().len(), 2);

    // In-process EXIF finds nothing in synthetic images, so every value is empty.
    let (_, none) = post_json(&h, "/api/pictures", json!({ "aperture": ["F5.6"] }));
    assert!(none.as_array().unwrap().is_empty());

    let (_, options) = get_json(&h, "/api/pictures/filters");
    assert_eq!(options["lens"], json!([]));
    assert!(options.get("mode").is_some());
}

#[test]
fn test_grouped_listing_is_keyed_by_month() {
    let h = harness();
    upload_one(&h, "a.jpg", 1);
    let (status, groups) = get_json(&h, "/api/pictures");
    assert_eq!(status, Status::Ok);
    let groups = groups.as_object().unwrap();
    assert_eq!(groups.len(), 1);
    let (label, pictures) = groups.iter().next().unwrap();
    assert!(label.chars().next().unwrap().is_uppercase());
    assert_eq!(pictures.as_array().unwrap().len(), 1);
}

#[test]
fn test_delete_picture_removes_files() {
    let h = harness();
    let id = upload_one(&h, "a.jpg", 1);
    let (_, meta) = get_json(&h, &format!("/api/pictures/{}", id));
    let path = meta["path"].as_str().unwrap().to_string();
    assert!(h.state.layout.thumb(&path).exists());

    let response = h.client.delete(format!("/api/pictures/{}", id)).dispatch();
    assert_eq!(response.status(), Status::NoContent);
    for dir in h.state.layout.dirs() {
        assert!(!dir.join(&path).exists());
    }

    let response = h.client.delete(format!("/api/pictures/{}", id)).dispatch();
    assert_eq!(response.status(), Status::NotFound);

    let log = std::fs::read_to_string(h.state.home.join("logs").join("operation.log")).unwrap();
    assert!(log.contains("UPLOAD"));
    assert!(log.contains(&format!("DELETE picture={}", id)));
}

#[test]
fn test_species_crud() {
    let h = harness();
    let id = create_species(&h, "Héron cendré", "Ardea cinerea");
    create_species(&h, "aigrette", "Egretta garzetta");

    let (status, body) = post_json(
        &h,
        "/api/species",
        json!({ "name": "Héron cendré", "scientific_name": "Other" }),
    );
    assert_eq!(status, Status::Conflict);
    assert_eq!(body["detail"], json!("A species with this name already exists"));

    let (_, list) = get_json(&h, "/api/species");
    let names: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["aigrette", "Héron cendré"]);

    let (status, updated) = send_json(
        &h,
        rocket::http::Method::Put,
        &format!("/api/species/{}", id),
        json!({ "name": "Héron", "scientific_name": "Ardea cinerea", "threat": "LC" }),
    );
    assert_eq!(status, Status::Ok);
    assert_eq!(updated["threat"], json!("LC"));

    let (status, _) = send_json(
        &h,
        rocket::http::Method::Put,
        "/api/species/999",
        json!({ "name": "x", "scientific_name": "y" }),
    );
    assert_eq!(status, Status::NotFound);

    let (status, _) = get_json(&h, "/api/species/Nope");
    assert_eq!(status, Status::NotFound);

    let response = h.client.delete(format!("/api/species/{}", id)).dispatch();
    assert_eq!(response.status(), Status::NoContent);
    let response = h.client.delete(format!("/api/species/{}", id)).dispatch();
    assert_eq!(response.status(), Status::NotFound);
}

#[test]
fn test_album_lifecycle() {
    let h = harness();
    let a = upload_one(&h, "a.jpg", 1);
    let b = upload_one(&h, "b.jpg", 2);

    let (status, album) = post_json(&h, "/api/albums", json!({ "name": "Camargue" }));
    assert_eq!(status, Status::Created);
    let album_id = album["id"].as_i64().unwrap();

    let (status, _) = post_json(&h, "/api/albums", json!({ "name": "Camargue" }));
    assert_eq!(status, Status::Conflict);

    let (status, _) = post_json(&h, "/api/albums/Camargue/add", json!({ "pictures": [a, 999] }));
    assert_eq!(status, Status::NotFound);
    let (_, unchanged) = get_json(&h, "/api/albums/Camargue");
    assert!(unchanged["pictures"].as_array().unwrap().is_empty());

    let (status, album) =
        post_json(&h, "/api/albums/Camargue/add", json!({ "pictures": [a, b, a] }));
    assert_eq!(status, Status::Ok);
    assert_eq!(album["pictures"].as_array().unwrap().len(), 2);

    let (status, album) =
        post_json(&h, &format!("/api/albums/Camargue/remove/{}", a), Value::Null);
    assert_eq!(status, Status::Ok);
    assert_eq!(album["pictures"][0]["id"], json!(b));

    let (status, _) = post_json(&h, "/api/albums/Nope/add", json!({ "pictures": [a] }));
    assert_eq!(status, Status::NotFound);

    let (_, albums) = get_json(&h, "/api/albums");
    assert_eq!(albums.as_array().unwrap().len(), 1);

    let response = h.client.delete(format!("/api/albums/{}", album_id)).dispatch();
    assert_eq!(response.status(), Status::NoContent);
    let (status, _) = get_json(&h, "/api/albums/Camargue");
    assert_eq!(status, Status::NotFound);
}

#[test]
fn test_refresh_reports_regenerated_derivatives() {
    let h = harness();
    let id = upload_one(&h, "a.jpg", 1);
    let (_, meta) = get_json(&h, &format!("/api/pictures/{}", id));
    let path = meta["path"].as_str().unwrap().to_string();
    std::fs::remove_file(h.state.layout.halfres_copy(&path)).unwrap();

    let (status, report) = get_json(&h, "/api/pictures/refresh");
    assert_eq!(status, Status::Ok);
    assert_eq!(report["regenerated"], json!(1));
    assert!(h.state.layout.halfres_copy(&path).exists());
}
