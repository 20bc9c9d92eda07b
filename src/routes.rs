use crate::{
    api::{attendance, report},
    auth::{
        handlers,
        middleware::{admin_middleware, device_middleware},
    },
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};

/// Per-IP limiter allowing `requests_per_min` with an equal burst.
pub fn limiter_config(requests_per_min: u32) -> GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    GovernorConfigBuilder::default()
        .per_millisecond((60_000 / u64::from(requests_per_min)).max(1))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default()
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let identity_limit = limiter_config(config.rate_identity_per_min);
    let attendance_limit = limiter_config(config.rate_attendance_per_min);

    // Public routes; the admin gate itself is deliberately unthrottled
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/anonymous")
                    .wrap(Governor::new(&identity_limit))
                    .route(web::post().to(handlers::anonymous)),
            )
            .service(web::resource("/admin/login").route(web::post().to(handlers::admin_login)))
            .service(web::resource("/admin/logout").route(web::post().to(handlers::admin_logout))),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .service(
                web::scope("/attendance")
                    .wrap(from_fn(device_middleware))
                    .wrap(Governor::new(&attendance_limit))
                    // /attendance/session
                    .service(
                        web::resource("/session")
                            .route(web::post().to(attendance::enter))
                            .route(web::delete().to(attendance::leave)),
                    )
                    .service(web::resource("/today").route(web::get().to(attendance::today)))
                    .service(
                        web::resource("/location")
                            .route(web::post().to(attendance::report_location)),
                    )
                    .service(
                        web::resource("/location/retry")
                            .route(web::post().to(attendance::retry_location)),
                    )
                    .service(web::resource("/check-in").route(web::post().to(attendance::check_in))),
            )
            .service(
                web::scope("/admin")
                    .wrap(from_fn(admin_middleware))
                    .service(web::resource("/users").route(web::get().to(report::list_users)))
                    // /admin/reports/{user_id}
                    .service(
                        web::resource("/reports/{user_id}")
                            .route(web::get().to(report::monthly_report)),
                    )
                    .service(
                        web::resource("/reports/{user_id}/export")
                            .route(web::get().to(report::export_report)),
                    )
                    .service(
                        web::resource("/reports/{user_id}/summary")
                            .route(web::post().to(report::summarize_report)),
                    ),
            ),
    );
}

// DEVICE
//  ├─ POST /auth/anonymous            -> identity token (kept on the device)
//  └─ Authorization: Bearer identity  -> /api/attendance/*

// ADMIN
//  ├─ POST /auth/admin/login          -> admin token (ADMIN_SESSION_TTL)
//  └─ Authorization: Bearer admin     -> /api/admin/*
