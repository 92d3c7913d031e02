use shared_types::{
    // Auth and profile
    AppError, AppErrorKind, CompanySignupRequest, CompanySignupResponse, LoginRequest,
    LoginResponse, MeResponse, MessageResponse, PasswordResetRequest, Profile, Program, Role,
    UpdateProfileRequest, UploadResponse,
    // Vacancies and eligibility
    ActionButton, ActionState, CompanyRef, CompanyVacancy, CreateVacancyRequest, FollowUp,
    Modality, ToggleVacancyResponse, UpdateVacancyRequest, Vacancy, VacancyCard, VacancyDetail,
    // Applications
    ApplicantView, Application, ApplyOutcome, ApplyOutcomeKind, ApplyRequest,
    BadgeTone, SendOfferRequest, SetApplicationStatusRequest,
    // Practices and notifications
    CompletePracticeRequest, Notification, NotificationFeed, Practice, PracticeOverview,
    PracticeState,
    // Groups
    AddMemberRequest, AddMemberResponse, CreateGroupRequest, Group, GroupDetail, MemberOverview,
    ProfessorVacancyParams, ProfessorVacancyView,
    RecommendRequest, UpdateGroupRequest,
    Page,
};
use utoipa::OpenApi;

use crate::health;
use crate::realtime;
use crate::rest;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        realtime::db_change,
        // Auth
        rest::auth::login,
        rest::auth::logout,
        rest::auth::password_reset,
        rest::auth::company_signup,
        rest::auth::me,
        rest::programs::list_programs,
        // Student
        rest::student::search_vacancies,
        rest::student::get_vacancy,
        rest::student::apply,
        rest::student::list_offers,
        rest::student::accept_offer,
        rest::student::decline_offer,
        rest::student::practice_overview,
        rest::student::complete_practice,
        rest::student::practice_status,
        rest::student::practice_status_stream,
        rest::student::add_favorite,
        rest::student::remove_favorite,
        rest::student::hide_vacancy,
        rest::student::unhide_vacancy,
        // Profile
        rest::profile::update_profile,
        rest::profile::upload_cv,
        rest::profile::delete_cv,
        rest::profile::upload_avatar,
        rest::profile::delete_avatar,
        // Notifications
        rest::notifications::list_notifications,
        rest::notifications::mark_all_read,
        rest::notifications::notification_stream,
        // Company
        rest::company::list_vacancies,
        rest::company::create_vacancy,
        rest::company::get_vacancy,
        rest::company::update_vacancy,
        rest::company::toggle_vacancy,
        rest::company::delete_vacancy,
        rest::company::list_applications,
        rest::company::send_offer,
        rest::company::reject_application,
        rest::company::set_application_status,
        // Professor
        rest::professor::list_groups,
        rest::professor::create_group,
        rest::professor::update_group,
        rest::professor::delete_group,
        rest::professor::list_members,
        rest::professor::add_member,
        rest::professor::remove_member,
        rest::professor::search_students,
        rest::professor::search_vacancies,
        rest::professor::get_vacancy,
        rest::professor::recommend_vacancy,
    ),
    components(schemas(
        AppError, AppErrorKind, MessageResponse, Role,
        LoginRequest, LoginResponse, PasswordResetRequest, CompanySignupRequest,
        CompanySignupResponse, MeResponse, Profile, Program, UpdateProfileRequest, UploadResponse,
        Vacancy, CompanyRef, Modality, VacancyCard, VacancyDetail, ActionButton, ActionState,
        FollowUp, CompanyVacancy, CreateVacancyRequest, UpdateVacancyRequest,
        ToggleVacancyResponse, rest::company::CompanyVacancyDetail,
        Application, BadgeTone, ApplicantView, ApplyRequest, ApplyOutcome,
        ApplyOutcomeKind, SendOfferRequest, SetApplicationStatusRequest,
        Practice, PracticeState, PracticeOverview, CompletePracticeRequest,
        Notification, NotificationFeed,
        Group, GroupDetail, MemberOverview, ProfessorVacancyView, ProfessorVacancyParams,
        CreateGroupRequest, UpdateGroupRequest,
        AddMemberRequest, AddMemberResponse, RecommendRequest,
        Page<VacancyCard>, Page<Vacancy>,
        health::HealthResponse,
    )),
    tags(
        (name = "auth", description = "Sign-in, sign-out and company registration"),
        (name = "programs", description = "Academic programs"),
        (name = "student", description = "Vacancy search, applications, offers and practices"),
        (name = "profile", description = "Profile fields, CV and avatar"),
        (name = "notifications", description = "Notification bell and live stream"),
        (name = "company", description = "Vacancy management and applicants"),
        (name = "professor", description = "Groups, members and recommendations"),
        (name = "hooks", description = "Database change webhook"),
        (name = "health", description = "Health check endpoint")
    ),
    info(
        title = "Portal de Prácticas API",
        description = "Backend for the university internship portal",
        version = "1.0.0"
    )
)]
pub struct ApiDoc;
