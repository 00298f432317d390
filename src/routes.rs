use crate::{
    api::{attendance, contract, correction, department, employee, payroll, position, shift, users},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let cfg = GovernorConfigBuilder::default()
        .milliseconds_per_request((60_000 / u64::from(requests_per_min)).max(1))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = build_limiter(config.rate_protected_per_min);

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(web::resource("/me").route(web::get().to(handlers::me)))
            .service(
                web::scope("/employees")
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(employee::get_employee))
                            .route(web::put().to(employee::update_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    )
                    .service(
                        web::resource("/{id}/contracts")
                            .route(web::post().to(contract::create_contract))
                            .route(web::get().to(contract::list_contracts)),
                    ),
            )
            .service(web::resource("/contracts/{id}").route(web::put().to(contract::update_contract)))
            .service(
                web::scope("/departments")
                    .service(
                        web::resource("")
                            .route(web::post().to(department::create_department))
                            .route(web::get().to(department::list_departments)),
                    )
                    .service(
                        web::resource("/{id}").route(web::put().to(department::update_department)),
                    ),
            )
            .service(
                web::resource("/positions")
                    .route(web::post().to(position::create_position))
                    .route(web::get().to(position::list_positions)),
            )
            .service(
                web::scope("/shifts")
                    .service(
                        web::resource("")
                            .route(web::post().to(shift::create_shift))
                            .route(web::get().to(shift::list_shifts)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(shift::get_shift))),
            )
            .service(
                web::scope("/users")
                    .service(
                        web::resource("")
                            .route(web::post().to(users::create_user))
                            .route(web::get().to(users::list_users)),
                    )
                    .service(web::resource("/{id}/role").route(web::put().to(users::change_role)))
                    .service(web::resource("/{id}/active").route(web::put().to(users::set_active))),
            )
            .service(
                web::scope("/attendance")
                    .service(web::resource("/check-in").route(web::post().to(attendance::check_in)))
                    .service(web::resource("/check-out").route(web::post().to(attendance::check_out)))
                    .service(
                        web::resource("/absences").route(web::post().to(attendance::mark_absences)),
                    )
                    .service(web::resource("/daily").route(web::get().to(attendance::daily_report)))
                    .service(
                        web::resource("/monthly").route(web::get().to(attendance::monthly_report)),
                    ),
            )
            .service(
                web::scope("/corrections")
                    .service(
                        web::resource("").route(web::post().to(correction::submit_correction)),
                    )
                    // literal paths before /{id}
                    .service(
                        web::resource("/mine").route(web::get().to(correction::list_my_corrections)),
                    )
                    .service(
                        web::resource("/pending")
                            .route(web::get().to(correction::list_pending_corrections)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(correction::get_correction)))
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(correction::approve_correction)),
                    )
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(correction::reject_correction)),
                    ),
            )
            .service(
                web::scope("/payroll")
                    .service(web::resource("").route(web::get().to(payroll::monthly_payroll)))
                    .service(web::resource("/export").route(web::get().to(payroll::export_payroll)))
                    .service(
                        web::resource("/employees/{employee_id}")
                            .route(web::get().to(payroll::employee_payroll)),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns new access_token + rotated refresh_token

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{
        App, HttpResponse, ResponseError,
        dev::Service,
        http::StatusCode,
        test::{TestRequest, init_service},
    };

    async fn statuses(limit: u32, calls: usize) -> Vec<StatusCode> {
        let app = init_service(
            App::new().service(
                web::resource("/ping")
                    .wrap(build_limiter(limit))
                    .route(web::get().to(HttpResponse::Ok)),
            ),
        )
        .await;

        let mut seen = Vec::new();
        for _ in 0..calls {
            let req = TestRequest::get()
                .uri("/ping")
                .peer_addr("127.0.0.1:40000".parse().unwrap())
                .to_request();
            let status = match app.call(req).await {
                Ok(res) => res.status(),
                Err(e) => e.as_response_error().status_code(),
            };
            seen.push(status);
        }
        seen
    }

    #[actix_web::test]
    async fn requests_past_the_burst_are_throttled() {
        assert_eq!(
            statuses(2, 3).await,
            vec![StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
        );
    }

    #[actix_web::test]
    async fn zero_rate_still_allows_one_request() {
        assert_eq!(
            statuses(0, 2).await,
            vec![StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
        );
    }
}
