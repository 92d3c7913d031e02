//! Page paths shared by the route guard, login responses and notifications.

pub const LOGIN: &str = "/login";
pub const COMPANY_SIGNUP: &str = "/empresa/signup";

pub const STUDENT_HOME: &str = "/alumno/buscar";
pub const PROFESSOR_HOME: &str = "/docente/grupos";
pub const COMPANY_HOME: &str = "/empresa/vacantes";

pub const STUDENT_OFFERS: &str = "/alumno/ofertas";
pub const STUDENT_PRACTICES: &str = "/alumno/mis-practicas";

/// Old student landing path kept alive as a redirect.
pub const LEGACY_STUDENTS: &str = "/estudiantes";

/// Prefixes reachable without a session. `/` is matched exactly.
pub const PUBLIC_PREFIXES: &[&str] = &[
    LOGIN,
    "/practicas",
    COMPANY_SIGNUP,
    "/img",
    "/assets",
    "/api",
    "/hooks",
    "/health",
    "/docs",
    "/favicon.ico",
];

/// Public pages that bounce a signed-in user to their home.
pub const AUTH_PAGES: &[&str] = &[LOGIN, COMPANY_SIGNUP];

