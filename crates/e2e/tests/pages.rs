//! Routed pages rendered against a live backend, no request stubbing

mod common;

use perkharness_common::NewPerk;
use perkharness_e2e::pages::{app_routes, DirectoryPage, MyPerksPage, PerkDetailsPage, PerkFormPage};
use perkharness_e2e::render::{render_at_route, Query, Role, Routes, StaticPage};

use common::{spawn_backend, unique};

#[tokio::test]
async fn my_perks_shows_the_seeded_perk() {
    let backend = spawn_backend().await;
    let suite = backend.suite().await;

    let outcome = suite
        .run(backend.users(), |ctx| async move {
            let routes = Routes::new().route("/perks", MyPerksPage);
            let page = render_at_route(routes, ["/perks"], &ctx.app).unwrap();

            page.wait_for_text(&ctx.seeded_perk.title).await.unwrap();
            assert!(!page.document().has_text("No perks found."));
        })
        .await;

    assert!(outcome.cleanup.is_clean());
    assert_eq!(outcome.cleanup.attempted, 2);
    assert_eq!(backend.users().user_count(), 0);
}

#[tokio::test]
async fn directory_filters_by_name() {
    let backend = spawn_backend().await;
    let suite = backend.suite().await;
    suite
        .create_perk(&common::perk(unique("Unrelated Benefit")))
        .await
        .unwrap();

    suite
        .run(backend.users(), |ctx| async move {
            let routes = Routes::new().route("/explore", DirectoryPage);
            let page = render_at_route(routes, ["/explore"], &ctx.app).unwrap();
            let seeded = &ctx.seeded_perk.title;

            page.wait_for_text(seeded).await.unwrap();
            page.wait_for_text("Showing 2 of 2 perks").await.unwrap();

            page.change(&Query::placeholder("Enter perk name..."), seeded.clone())
                .unwrap();

            page.wait_for_text("Showing 1 of 2 perks").await.unwrap();
            assert!(page.document().has_text(seeded));
            assert!(page.document().contains(&Query::text_contains("showing")));
        })
        .await;
}

#[tokio::test]
async fn directory_filters_by_merchant() {
    let backend = spawn_backend().await;
    let suite = backend.suite().await;
    let other = NewPerk {
        merchant: "Elsewhere Ltd".to_string(),
        ..common::perk(unique("Elsewhere Benefit"))
    };
    let other = suite.create_perk(&other).await.unwrap();

    suite
        .run(backend.users(), |ctx| async move {
            let page = render_at_route(app_routes(), ["/explore"], &ctx.app).unwrap();
            page.wait_for_text(&ctx.seeded_perk.title).await.unwrap();

            let merchants = page.document().find(&Query::Role(Role::Combobox)).unwrap().options.clone();
            assert!(merchants.contains(&ctx.seeded_perk.merchant));

            page.change(&Query::Role(Role::Combobox), ctx.seeded_perk.merchant.clone())
                .unwrap();

            page.wait_until_gone(&Query::text(&other.title)).await.unwrap();
            assert!(page.document().has_text(&ctx.seeded_perk.title));
            assert!(page.document().contains(&Query::text_contains("Showing")));
        })
        .await;
}

#[tokio::test]
async fn details_render_every_field() {
    let backend = spawn_backend().await;
    let suite = backend.suite().await;

    let perk = suite
        .create_perk(&NewPerk {
            title: unique("Detail Page Perk"),
            description: "Detail page integration test perk.".to_string(),
            category: "fitness".to_string(),
            merchant: "Detail Merchant".to_string(),
            discount_percent: 12.0,
        })
        .await
        .unwrap();

    suite
        .run(backend.users(), |ctx| async move {
            let routes = Routes::new().route("/perks/:perkId/view", PerkDetailsPage);
            let location = format!("/perks/{}/view", perk.id);
            let page = render_at_route(routes, [location], &ctx.app).unwrap();

            page.wait_for_text(&perk.title).await.unwrap();

            let doc = page.document();
            assert!(doc.has_text("Discount: 12%"));
            assert!(doc.contains(&Query::text_contains("fitness")));
            assert!(doc.has_text("Merchant: Detail Merchant"));
        })
        .await;
}

#[tokio::test]
async fn details_of_unknown_perk_say_not_found() {
    let backend = spawn_backend().await;
    let suite = backend.suite().await;

    suite
        .run(backend.users(), |ctx| async move {
            let page = render_at_route(app_routes(), ["/perks/does-not-exist/view"], &ctx.app).unwrap();
            page.wait_for_text("Perk not found.").await.unwrap();
        })
        .await;
}

#[tokio::test]
async fn form_creates_a_perk_and_redirects() {
    let backend = spawn_backend().await;
    let suite = backend.suite().await;
    let label = unique("Created Via Form");

    suite
        .run(backend.users(), |ctx| async move {
            let routes = Routes::new()
                .route("/perks/create", PerkFormPage)
                .route("/perks", StaticPage::new("perks-landing", "Redirected"));
            let page = render_at_route(routes, ["/perks/create"], &ctx.app).unwrap();

            page.change(&Query::placeholder("Title"), label.clone()).unwrap();
            page.change(&Query::placeholder("Merchant"), "Form Merchant").unwrap();
            page.change(&Query::Role(Role::Combobox), "tech").unwrap();
            page.change(&Query::placeholder("Discount %"), "30").unwrap();
            page.change(&Query::placeholder("Description"), "Created from the create perk page test.")
                .unwrap();

            page.click(&Query::button("save")).unwrap();

            page.wait_for_element(&Query::test_id("perks-landing")).await.unwrap();
            assert_eq!(page.location(), "/perks");

            let created = ctx
                .api()
                .list_perks()
                .await
                .unwrap()
                .into_iter()
                .find(|p| p.title == label)
                .expect("form submission should have created the perk");
            ctx.created.track(&created);

            assert_eq!(created.category, "tech");
            assert_eq!(created.discount_percent, 30.0);
        })
        .await;

    assert_eq!(backend.server.state().perk_count(), 0);
}

#[tokio::test]
async fn form_rejects_a_non_numeric_discount() {
    let backend = spawn_backend().await;
    let suite = backend.suite().await;

    suite
        .run(backend.users(), |ctx| async move {
            let page = render_at_route(app_routes(), ["/perks/create"], &ctx.app).unwrap();

            page.change(&Query::placeholder("Title"), "Never Saved").unwrap();
            page.change(&Query::placeholder("Merchant"), "Nobody").unwrap();
            page.change(&Query::placeholder("Discount %"), "lots").unwrap();
            page.click(&Query::button("save")).unwrap();

            page.wait_for_element(&Query::Role(Role::Alert)).await.unwrap();
            assert_eq!(page.location(), "/perks/create");
        })
        .await;
}

#[tokio::test]
async fn edit_form_updates_and_returns_to_my_perks() {
    let backend = spawn_backend().await;
    let suite = backend.suite().await;

    suite
        .run(backend.users(), |ctx| async move {
            let seeded = ctx.seeded_perk.clone();
            let page = render_at_route(app_routes(), [format!("/perks/{}/edit", seeded.id)], &ctx.app).unwrap();

            let title = page.wait_for_element(&Query::placeholder("Title")).await.unwrap();
            assert_eq!(title.value.as_deref(), Some(seeded.title.as_str()));

            page.change(&Query::placeholder("Discount %"), "35").unwrap();
            page.click(&Query::button("save")).unwrap();

            page.wait_for_text("My Perks").await.unwrap();
            assert_eq!(page.location(), "/perks");

            let updated = ctx.api().get_perk(&seeded.id).await.unwrap();
            assert_eq!(updated.discount_percent, 35.0);
            assert_eq!(updated.title, seeded.title);
        })
        .await;
}

#[tokio::test]
async fn my_perks_navigates_to_details() {
    let backend = spawn_backend().await;
    let suite = backend.suite().await;

    suite
        .run(backend.users(), |ctx| async move {
            let page = render_at_route(app_routes(), ["/perks"], &ctx.app).unwrap();
            page.wait_for_text(&ctx.seeded_perk.title).await.unwrap();

            page.click(&Query::button("view")).unwrap();
            page.wait_for_text(&format!("Discount: {}%", ctx.seeded_perk.discount_percent))
                .await
                .unwrap();
            assert_eq!(page.location(), format!("/perks/{}/view", ctx.seeded_perk.id));
        })
        .await;
}
