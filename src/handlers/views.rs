// src/handlers/views.rs
// DOCUMENTATION: Server-rendered pages
// PURPOSE: Overview, tour detail, auth forms and account pages rendered with askama

use crate::auth::{CurrentUser, MaybeUser};
use crate::db::{QueryFeatures, Resource, Scope, TourRepository, UserRepository};
use crate::errors::AppError;
use crate::models::{Role, Tour, TourDetail, User};
use actix_web::{http::StatusCode, web, HttpResponse, ResponseError};
use askama::Template;
use serde::Deserialize;
use sqlx::PgPool;
use std::fmt;
use validator::Validate;

const BOOKING_ALERT: &str = "Your booking was successful! Please check your email for a \
confirmation. If your booking doesn't show up here immediately, please come back later.";

#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    alert: Option<String>,
}

impl AlertQuery {
    fn message(&self) -> Option<&'static str> {
        match self.alert.as_deref() {
            Some("booking") => Some(BOOKING_ALERT),
            _ => None,
        }
    }
}

/// Card on the overview grid
pub struct TourCard {
    pub slug: String,
    pub name: String,
    pub image_cover: String,
    pub heading: String,
    pub summary: String,
    pub location: String,
    pub next_date: String,
    pub stops: usize,
    pub group_size: i32,
    pub price: f64,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
}

impl From<&Tour> for TourCard {
    fn from(tour: &Tour) -> Self {
        TourCard {
            slug: tour.slug.clone(),
            name: tour.name.clone(),
            image_cover: tour.image_cover.clone(),
            heading: format!("{} {}-day tour", tour.difficulty.as_str(), tour.duration),
            summary: tour.summary.clone(),
            location: start_description(tour),
            next_date: tour
                .next_start()
                .map(|d| d.format("%B %Y").to_string())
                .unwrap_or_else(|| "To be announced".to_string()),
            stops: tour.locations.len(),
            group_size: tour.max_group_size,
            price: tour.price,
            ratings_average: tour.ratings_average,
            ratings_quantity: tour.ratings_quantity,
        }
    }
}

pub struct GuideView {
    pub name: String,
    pub photo: String,
    pub label: &'static str,
}

pub struct ReviewView {
    pub name: String,
    pub photo: String,
    pub text: String,
    /// "active" / "inactive" per star
    pub stars: Vec<&'static str>,
}

pub struct StopView {
    pub day: String,
    pub description: String,
}

fn start_description(tour: &Tour) -> String {
    tour.start_location
        .as_ref()
        .and_then(|l| l.description.clone())
        .unwrap_or_default()
}

fn stars(rating: f64) -> Vec<&'static str> {
    (1..=5)
        .map(|i| if rating >= i as f64 { "active" } else { "inactive" })
        .collect()
}

#[derive(Template)]
#[template(path = "overview.html")]
struct OverviewPage {
    title: String,
    user: Option<User>,
    alert: Option<&'static str>,
    tours: Vec<TourCard>,
}

#[derive(Template)]
#[template(path = "tour.html")]
struct TourPage {
    title: String,
    user: Option<User>,
    alert: Option<&'static str>,
    card: TourCard,
    tour_id: String,
    description: Vec<String>,
    images: Vec<String>,
    guides: Vec<GuideView>,
    stops: Vec<StopView>,
    reviews: Vec<ReviewView>,
    duration: i32,
}

impl TourPage {
    fn new(detail: TourDetail, user: Option<User>) -> Self {
        let TourDetail {
            tour,
            guides,
            reviews,
        } = detail;

        TourPage {
            title: format!("{} Tour", tour.name),
            user,
            alert: None,
            card: TourCard::from(&tour),
            tour_id: tour.id.to_string(),
            description: tour
                .description
                .as_deref()
                .unwrap_or_default()
                .split('\n')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect(),
            images: tour.images.clone(),
            guides: guides
                .into_iter()
                .map(|g| GuideView {
                    label: if g.role == Role::LeadGuide {
                        "Lead guide"
                    } else {
                        "Tour guide"
                    },
                    name: g.name,
                    photo: g.photo,
                })
                .collect(),
            stops: tour
                .locations
                .iter()
                .map(|l| StopView {
                    day: l.day.map(|d| format!("Day {}", d)).unwrap_or_default(),
                    description: l.description.clone().unwrap_or_default(),
                })
                .collect(),
            reviews: reviews
                .into_iter()
                .map(|r| ReviewView {
                    stars: stars(r.rating),
                    name: r.user.name,
                    photo: r.user.photo,
                    text: r.review,
                })
                .collect(),
            duration: tour.duration,
        }
    }
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginPage {
    title: String,
    user: Option<User>,
    alert: Option<&'static str>,
}

#[derive(Template)]
#[template(path = "signup.html")]
struct SignupPage {
    title: String,
    user: Option<User>,
    alert: Option<&'static str>,
}

#[derive(Template)]
#[template(path = "account.html")]
struct AccountPage {
    title: String,
    user: Option<User>,
    alert: Option<&'static str>,
    name: String,
    email: String,
    photo: String,
    is_admin: bool,
}

impl AccountPage {
    fn new(user: User) -> Self {
        AccountPage {
            title: "Your account".to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            photo: user.photo.clone(),
            is_admin: user.role == Role::Admin,
            user: Some(user),
            alert: None,
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorPage {
    title: String,
    user: Option<User>,
    alert: Option<&'static str>,
    message: String,
}

/// Error rendered as an HTML page instead of the JSON envelope
#[derive(Debug)]
pub struct PageError {
    status: StatusCode,
    message: String,
}

impl PageError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        PageError {
            status,
            message: message.into(),
        }
    }
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<AppError> for PageError {
    fn from(e: AppError) -> Self {
        if !e.is_operational() {
            log::error!("Page rendering failed: {}", e);
        }
        PageError::new(e.status_code(), e.public_message())
    }
}

impl ResponseError for PageError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        let page = ErrorPage {
            title: "Something went wrong!".to_string(),
            user: None,
            alert: None,
            message: self.message.clone(),
        };
        match page.render() {
            Ok(html) => HttpResponse::build(self.status)
                .content_type("text/html; charset=utf-8")
                .body(html),
            Err(e) => {
                log::error!("Error page rendering failed: {}", e);
                HttpResponse::build(self.status).body(self.message.clone())
            }
        }
    }
}

fn html<T: Template>(page: T) -> Result<HttpResponse, PageError> {
    let body = page.render().map_err(AppError::from)?;
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body))
}

/// Pages behind login accept the same bearer header or cookie as the API
fn require_login(user: Result<CurrentUser, AppError>) -> Result<User, PageError> {
    user.map(CurrentUser::into_inner).map_err(PageError::from)
}

/// GET /
pub async fn overview(
    pool: web::Data<PgPool>,
    user: MaybeUser,
    query: web::Query<AlertQuery>,
) -> Result<HttpResponse, PageError> {
    let features = QueryFeatures::parse(&[], Tour::QUERY_FIELDS)?;
    let tours = Tour::find_all(&pool, &Scope::default(), &features).await?;

    html(OverviewPage {
        title: "All Tours".to_string(),
        user: user.0,
        alert: query.message(),
        tours: tours.iter().map(TourCard::from).collect(),
    })
}

/// GET /tour/{slug}
pub async fn tour(
    pool: web::Data<PgPool>,
    user: MaybeUser,
    path: web::Path<String>,
) -> Result<HttpResponse, PageError> {
    let tour = TourRepository::find_by_slug(&pool, &path.into_inner())
        .await?
        .ok_or_else(|| PageError::new(StatusCode::NOT_FOUND, "There is no tour with that name."))?;
    let detail = TourRepository::load_detail(&pool, tour).await?;

    html(TourPage::new(detail, user.0))
}

/// GET /login
pub async fn login_form(user: MaybeUser) -> Result<HttpResponse, PageError> {
    html(LoginPage {
        title: "Log into your account".to_string(),
        user: user.0,
        alert: None,
    })
}

/// GET /signup
pub async fn signup_form(user: MaybeUser) -> Result<HttpResponse, PageError> {
    html(SignupPage {
        title: "Create your account".to_string(),
        user: user.0,
        alert: None,
    })
}

/// GET /me
pub async fn account(user: Result<CurrentUser, AppError>) -> Result<HttpResponse, PageError> {
    let user = require_login(user)?;
    html(AccountPage::new(user))
}

/// GET /my-tours
pub async fn my_tours(
    pool: web::Data<PgPool>,
    user: Result<CurrentUser, AppError>,
    query: web::Query<AlertQuery>,
) -> Result<HttpResponse, PageError> {
    let user = require_login(user)?;
    let tours = TourRepository::find_booked_by_user(&pool, user.id).await?;

    html(OverviewPage {
        title: "My Tours".to_string(),
        user: Some(user),
        alert: query.message(),
        tours: tours.iter().map(TourCard::from).collect(),
    })
}

/// Plain HTML form variant of PATCH /api/v1/users/updateMe
#[derive(Debug, Deserialize, Validate)]
pub struct UserDataForm {
    #[validate(length(min = 1, max = 100, message = "Please tell us your name!"))]
    name: String,
    #[validate(email(message = "Please provide a valid email address."))]
    email: String,
}

/// POST /submit-user-data
pub async fn submit_user_data(
    pool: web::Data<PgPool>,
    user: Result<CurrentUser, AppError>,
    form: web::Form<UserDataForm>,
) -> Result<HttpResponse, PageError> {
    let user = require_login(user)?;
    let mut form = form.into_inner();
    form.name = form.name.trim().to_string();
    form.email = form.email.trim().to_lowercase();
    form.validate().map_err(AppError::from)?;

    let updated = UserRepository::update_profile(
        &pool,
        user.id,
        Some(&form.name),
        Some(&form.email),
    )
    .await?;

    html(AccountPage::new(updated))
}

/// Configuration for page routes
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(overview))
        .route("/tour/{slug}", web::get().to(tour))
        .route("/login", web::get().to(login_form))
        .route("/signup", web::get().to(signup_form))
        .route("/me", web::get().to(account))
        .route("/my-tours", web::get().to(my_tours))
        .route("/submit-user-data", web::post().to(submit_user_data));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tour::sample_tour;
    use crate::models::user::sample_user;
    use crate::models::{Review, TourLocation, UserSummary};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_stars() {
        assert_eq!(
            stars(4.0),
            vec!["active", "active", "active", "active", "inactive"]
        );
        assert_eq!(stars(5.0).iter().filter(|s| **s == "active").count(), 5);
    }

    #[test]
    fn test_alert_query() {
        let booking = AlertQuery {
            alert: Some("booking".to_string()),
        };
        assert_eq!(booking.message(), Some(BOOKING_ALERT));
        let other = AlertQuery {
            alert: Some("other".to_string()),
        };
        assert!(other.message().is_none());
    }

    #[test]
    fn test_overview_renders_cards_and_alert() {
        let tour = sample_tour();
        let page = OverviewPage {
            title: "All Tours".to_string(),
            user: None,
            alert: Some(BOOKING_ALERT),
            tours: vec![TourCard::from(&tour)],
        };
        let html = page.render().unwrap();

        assert!(html.contains("The Forest Hiker"));
        assert!(html.contains(&format!("/tour/{}", tour.slug)));
        assert!(html.contains("alert--success"));
        assert!(html.contains("Log in"));
    }

    #[test]
    fn test_tour_page_renders_reviews_and_booking_button() {
        let mut tour = sample_tour();
        tour.locations = vec![TourLocation {
            kind: "Point".to_string(),
            coordinates: [-116.214531, 51.417611],
            address: None,
            description: Some("Banff National Park".to_string()),
            day: Some(1),
        }];
        let reviewer = sample_user(Role::User);
        let detail = TourDetail {
            reviews: vec![Review {
                id: Uuid::new_v4(),
                review: "Unforgettable <3".to_string(),
                rating: 5.0,
                tour: tour.id,
                user: UserSummary {
                    id: reviewer.id,
                    name: reviewer.name.clone(),
                    photo: reviewer.photo.clone(),
                },
                created_at: Utc::now(),
            }],
            guides: vec![],
            tour,
        };

        let html = TourPage::new(detail, Some(reviewer)).render().unwrap();
        assert!(html.contains("Unforgettable &lt;3"));
        assert!(html.contains("Banff National Park"));
        assert!(html.contains("book-tour"));
    }

    #[test]
    fn test_account_page() {
        let html = AccountPage::new(sample_user(Role::Admin)).render().unwrap();
        assert!(html.contains("laura@example.com"));
        assert!(html.contains("Manage tours"));
    }

    #[actix_web::test]
    async fn test_page_error_renders_html() {
        let resp = PageError::new(StatusCode::NOT_FOUND, "There is no tour with that name.")
            .error_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("There is no tour with that name."));
    }
}
