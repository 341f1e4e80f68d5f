use super::*;
use image::{Rgb, imageops};

fn checker(name: &str, on: Rgb<u8>) -> LoadedTemplate {
    let rgb = RgbImage::from_fn(6, 6, |x, y| {
        if (x / 2 + y / 2) % 2 == 0 { on } else { Rgb([0, 0, 0]) }
    });
    LoadedTemplate::from_rgb(name, rgb, None)
}

fn vision_with(templates: Vec<LoadedTemplate>) -> (TemplateVision, Arc<TemplateLibrary>) {
    let library = Arc::new(TemplateLibrary::new("/nonexistent"));
    for t in templates {
        library.insert(t);
    }
    (TemplateVision::new(Arc::clone(&library), MatchPool::new(2)), library)
}

fn scene(pastes: &[(&LoadedTemplate, u32, u32)]) -> Screenshot {
    let mut rgb = RgbImage::from_pixel(64, 48, Rgb([40, 40, 40]));
    for (tpl, x, y) in pastes {
        imageops::replace(&mut rgb, &tpl.rgb, *x as i64, *y as i64);
    }
    Screenshot::from_rgb(rgb)
}

#[tokio::test]
async fn test_search_reports_center_of_match() {
    let tpl = checker("button", Rgb([255, 255, 255]));
    let shot = scene(&[(&tpl, 20, 10)]);
    let (vision, _) = vision_with(vec![tpl]);

    let result = vision.search(&shot, "button", None, 0.9).await.unwrap();
    assert!(result.found);
    assert_eq!(result.point, Point::new(23, 13));
}

#[tokio::test]
async fn test_search_outside_area_is_not_found() {
    let tpl = checker("button", Rgb([255, 255, 255]));
    let shot = scene(&[(&tpl, 40, 30)]);
    let (vision, _) = vision_with(vec![tpl]);

    let result = vision
        .search_grayscale(&shot, "button", Some(Area::new(0, 0, 30, 20)), 0.95)
        .await
        .unwrap();
    assert!(!result.found);
}

#[tokio::test]
async fn test_default_area_from_template_is_used() {
    let mut tpl = checker("corner", Rgb([255, 255, 255]));
    tpl.default_area = Some(Area::new(0, 0, 20, 20));
    let shot = scene(&[(&tpl, 40, 30)]);
    let (vision, _) = vision_with(vec![tpl]);

    let result = vision.search_grayscale(&shot, "corner", None, 0.95).await.unwrap();
    assert!(!result.found);

    let anywhere = vision
        .search_grayscale(&shot, "corner", Some(shot.full_area()), 0.95)
        .await
        .unwrap();
    assert!(anywhere.found);
}

#[tokio::test]
async fn test_search_all_returns_each_copy() {
    let tpl = checker("coin", Rgb([255, 255, 255]));
    let shot = scene(&[(&tpl, 4, 4), (&tpl, 30, 8), (&tpl, 50, 36)]);
    let (vision, _) = vision_with(vec![tpl]);

    let results = vision.search_all(&shot, "coin", None, 0.95, 10).await.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.found));

    let capped = vision.search_all(&shot, "coin", None, 0.95, 2).await.unwrap();
    assert_eq!(capped.len(), 2);
}

#[tokio::test]
async fn test_unknown_template_is_an_error() {
    let (vision, _) = vision_with(vec![]);
    let shot = scene(&[]);
    let err = vision.search(&shot, "missing", None, 0.9).await.unwrap_err();
    assert!(matches!(err, VisionError::TemplateNotFound { .. }));
}

#[tokio::test]
async fn test_read_text_requires_digit_glyphs() {
    let (vision, _) = vision_with(vec![]);
    let shot = scene(&[]);
    let err = vision.read_text(&shot, Area::new(0, 0, 10, 10)).await.unwrap_err();
    assert!(matches!(err, VisionError::TemplateNotFound { .. }));
}

#[test]
fn test_screenshot_decodes_png() {
    let rgb = RgbImage::from_pixel(8, 4, Rgb([1, 2, 3]));
    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(rgb)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();

    let shot = Screenshot::decode(&png).unwrap();
    assert_eq!((shot.width(), shot.height()), (8, 4));
    assert_eq!(shot.full_area(), Area::new(0, 0, 8, 4));
}
