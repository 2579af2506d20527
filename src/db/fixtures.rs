//! Starter records written into an empty store.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::models::{
    Break, BreakType, Category, DecisionOption, Financials, InternalNote, InventoryItem, Invoice,
    InvoiceStatus, Media, NoteKind, Part, PartStatus, Priority, Project, ProjectStatus,
    ProjectTemplate, Shift, SubTask, SubTaskStatus, Technician, TimelineUpdate, User, UserRole,
    Vehicle,
};

pub fn users() -> Vec<User> {
    let mut users = vec![
        user("user-boss", "John \"Boss\" Doe", UserRole::Boss),
        user("user-manager", "Sarah Manager", UserRole::Manager),
        user("user-client-1", "John Smith", UserRole::Client),
    ];
    users.extend(
        TECHNICIANS
            .iter()
            .map(|(slug, name, _)| user(&format!("user-tech-{slug}"), name, UserRole::Technician)),
    );
    users
}

pub fn technicians() -> Vec<Technician> {
    TECHNICIANS
        .iter()
        .map(|(slug, name, rate)| Technician {
            id: format!("tech-{slug}"),
            name: (*name).to_string(),
            user_id: format!("user-tech-{slug}"),
            hourly_rate: Some(*rate),
        })
        .collect()
}

const TECHNICIANS: [(&str, &str, f64); 7] = [
    ("dean", "Dean", 220.0),
    ("jovan", "Jovan", 135.0),
    ("ruan", "Ruan", 130.0),
    ("dj", "DJ", 170.0),
    ("moses", "Moses", 125.0),
    ("nico", "Nico", 105.0),
    ("thabo", "Thabo", 130.0),
];

fn user(id: &str, name: &str, role: UserRole) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        role,
    }
}

pub fn inventory() -> Vec<InventoryItem> {
    [
        ("inv-001", "FLT-OIL-01", "Premium Oil Filter", 25, 10, "Auto Parts Pro", 150.0),
        ("inv-002", "BRK-PAD-45", "Ceramic Brake Pads (Set)", 8, 10, "Brake Corp", 800.0),
        ("inv-003", "SPK-PLG-B6", "Spark Plug (V8 Set)", 15, 5, "Ignition Inc.", 450.0),
        ("inv-004", "SYN-OIL-5W30", "5W-30 Synthetic Oil (5L)", 32, 15, "Auto Parts Pro", 550.0),
        ("inv-005", "FLT-AIR-12", "Performance Air Filter", 0, 5, "Speed Systems", 700.0),
        ("inv-006", "BLT-SRP-7PK", "Serpentine Belt 7PK1855", 9, 8, "Belt Masters", 250.0),
        ("inv-007", "GKT-VLV-SBC", "Valve Cover Gasket (SBC)", 12, 10, "Seals & Gaskets", 350.0),
        ("inv-008", "FUS-STD-10A", "10A Blade Fuse (50 pack)", 5, 5, "Ignition Inc.", 100.0),
    ]
    .into_iter()
    .map(
        |(id, sku, name, stock_qty, reorder_point, supplier, unit_cost)| InventoryItem {
            id: id.to_string(),
            sku: sku.to_string(),
            name: name.to_string(),
            stock_qty,
            reorder_point: Some(reorder_point),
            supplier: Some(supplier.to_string()),
            unit_cost: Some(unit_cost),
        },
    )
    .collect()
}

pub fn templates() -> Vec<ProjectTemplate> {
    vec![
        ProjectTemplate {
            id: "full-restoration".to_string(),
            name: "Full Restoration".to_string(),
            categories: vec![
                template_category(
                    "body-paint",
                    "Body & Paint",
                    25.0,
                    &[
                        ("bp1", "Media Blasting", Priority::Normal),
                        ("bp2", "Rust Repair & Panel Replacement", Priority::High),
                        ("bp3", "Body Filler & Sanding", Priority::Normal),
                        ("bp4", "Primer Application", Priority::Normal),
                        ("bp5", "Final Paint", Priority::Normal),
                        ("bp6", "Clear Coat & Polishing", Priority::Low),
                    ],
                ),
                template_category(
                    "chassis-suspension",
                    "Chassis & Suspension",
                    20.0,
                    &[
                        ("cs1", "Frame Inspection & Repair", Priority::High),
                        ("cs2", "Front Suspension Rebuild", Priority::Normal),
                        ("cs3", "Rear Suspension Rebuild", Priority::Normal),
                        ("cs4", "Brake System Installation", Priority::High),
                        ("cs5", "Steering Box & Linkage", Priority::Normal),
                    ],
                ),
                template_category(
                    "engine",
                    "Engine & Drivetrain",
                    25.0,
                    &[
                        ("en1", "Engine Disassembly & Inspection", Priority::High),
                        ("en2", "Block Machining", Priority::Normal),
                        ("en3", "Engine Assembly", Priority::High),
                        ("en4", "Transmission Rebuild", Priority::Normal),
                        ("en5", "Driveshaft Balancing & Installation", Priority::Low),
                        ("en6", "Engine & Transmission Installation", Priority::Normal),
                    ],
                ),
                template_category(
                    "interior",
                    "Interior",
                    15.0,
                    &[
                        ("in1", "Floor Pan Sound Deadening", Priority::Normal),
                        ("in2", "Carpet Installation", Priority::Low),
                        ("in3", "Dashboard & Gauge Restoration", Priority::Normal),
                        ("in4", "Seat Upholstery", Priority::Normal),
                        ("in5", "Headliner Installation", Priority::Normal),
                    ],
                ),
                template_category(
                    "electrical",
                    "Electrical & Wiring",
                    15.0,
                    &[
                        ("el1", "Design & Layout New Wiring Harness", Priority::Normal),
                        ("el2", "Main Harness Installation", Priority::High),
                        ("el3", "Lighting & Signals", Priority::Normal),
                        ("el4", "Ignition System", Priority::Normal),
                    ],
                ),
            ],
        },
        ProjectTemplate {
            id: "major-service".to_string(),
            name: "Major Service".to_string(),
            categories: vec![
                template_category(
                    "engine",
                    "Engine Service",
                    60.0,
                    &[
                        ("ms1", "Oil & Filter Change", Priority::Normal),
                        ("ms2", "Spark Plug Replacement", Priority::Normal),
                        ("ms3", "Air Filter Replacement", Priority::Normal),
                        ("ms4", "Coolant Flush", Priority::Low),
                        ("ms5", "Carburetor Tune-up", Priority::Normal),
                    ],
                ),
                template_category(
                    "chassis",
                    "Chassis Check",
                    40.0,
                    &[
                        ("ms6", "Brake Inspection", Priority::High),
                        ("ms7", "Tire Rotation & Pressure Check", Priority::Low),
                        ("ms8", "Suspension Check", Priority::Normal),
                    ],
                ),
            ],
        },
    ]
}

fn template_category(
    id: &str,
    name: &str,
    weight: f64,
    tasks: &[(&str, &str, Priority)],
) -> Category {
    Category {
        id: id.to_string(),
        name: name.to_string(),
        weight,
        sub_tasks: tasks
            .iter()
            .map(|(id, name, priority)| SubTask::new(*id, *name, *priority))
            .collect(),
        requires_qa: false,
        owner: None,
    }
}

/// Shifts over the last week plus two older ones for the all-time view.
pub fn shifts(now: DateTime<Utc>) -> Vec<Shift> {
    [
        ("shift-1", "dean", 4, (8, 0), (17, 0), (12, 0), (12, 30)),
        ("shift-2", "dean", 3, (8, 5), (17, 0), (12, 0), (13, 0)),
        ("shift-7", "dean", 2, (7, 55), (16, 30), (12, 0), (12, 30)),
        ("shift-8", "dean", 1, (8, 0), (17, 0), (12, 30), (13, 0)),
        ("shift-3", "jovan", 4, (8, 15), (17, 0), (12, 30), (13, 0)),
        ("shift-10", "jovan", 3, (8, 0), (17, 0), (12, 0), (12, 30)),
        ("shift-4", "jovan", 2, (8, 0), (18, 0), (12, 0), (12, 30)),
        ("shift-5", "ruan", 1, (9, 0), (17, 0), (13, 0), (13, 30)),
        ("shift-14", "ruan", 0, (8, 0), (17, 0), (12, 0), (12, 30)),
        ("shift-6", "ruan", 35, (8, 0), (17, 0), (12, 0), (12, 30)),
        ("shift-15", "dean", 40, (8, 0), (17, 0), (12, 0), (12, 30)),
    ]
    .into_iter()
    .map(
        |(id, technician, days_ago, clock_in, clock_out, lunch_start, lunch_end)| Shift {
            id: id.to_string(),
            user_id: format!("user-tech-{technician}"),
            clock_in_time: at(now, days_ago, clock_in),
            clock_out_time: Some(at(now, days_ago, clock_out)),
            breaks: vec![Break {
                kind: BreakType::Lunch,
                start_time: at(now, days_ago, lunch_start),
                end_time: Some(at(now, days_ago, lunch_end)),
            }],
        },
    )
    .collect()
}

fn at(now: DateTime<Utc>, days_ago: i64, (hour, minute): (u32, u32)) -> DateTime<Utc> {
    let day = (now - Duration::days(days_ago)).date_naive();
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&day.and_time(time))
}

fn date(now: DateTime<Utc>, offset_days: i64) -> NaiveDate {
    (now + Duration::days(offset_days)).date_naive()
}

pub fn projects(now: DateTime<Utc>) -> Vec<Project> {
    vec![mustang(now), camaro(now), charger(now)]
}

fn scheduled(
    mut task: SubTask,
    now: DateTime<Utc>,
    assignee: &str,
    window: Option<(i64, i64)>,
) -> SubTask {
    task.assigned_to = Some(format!("tech-{assignee}"));
    if let Some((start, due)) = window {
        task.start_date = Some(date(now, start));
        task.due_date = Some(date(now, due));
    }
    task
}

fn completed(mut task: SubTask, now: DateTime<Utc>, days_ago: i64, hours: f64) -> SubTask {
    task.status = SubTaskStatus::Completed;
    task.completed_at = Some(now - Duration::days(days_ago));
    task.actual_hours = Some(hours);
    task
}

fn mustang(now: DateTime<Utc>) -> Project {
    let mut blasting = completed(
        scheduled(SubTask::new("bp1", "Media Blasting", Priority::Normal), now, "dean", None),
        now,
        4,
        22.0,
    );
    blasting.estimate_hours = Some(20.0);
    blasting.technician_notes = Some(
        "Media blasting complete. Revealed minor rust on the passenger-side floor pan."
            .to_string(),
    );

    let mut rust = completed(
        scheduled(SubTask::new("bp2", "Rust Repair", Priority::High), now, "dean", None),
        now,
        2,
        35.0,
    );
    rust.estimate_hours = Some(40.0);

    let mut filler = scheduled(
        SubTask::new("bp3", "Body Filler & Sanding", Priority::High),
        now,
        "jovan",
        Some((-1, 8)),
    );
    filler.status = SubTaskStatus::InProgress;
    filler.estimate_hours = Some(30.0);
    filler.actual_hours = Some(14.0);
    filler.internal_notes.push(InternalNote {
        id: "note-1".to_string(),
        author_id: "user-manager".to_string(),
        author_name: "Sarah Manager".to_string(),
        note: "Ensure feathering is perfect.".to_string(),
        kind: NoteKind::Instruction,
        created_at: now - Duration::days(1),
    });

    let mut primer = scheduled(
        SubTask::new("bp4", "Primer Application", Priority::Normal),
        now,
        "jovan",
        Some((9, 13)),
    );
    primer.estimate_hours = Some(15.0);

    let mut paint = SubTask::new("bp5", "Select Final Paint Shade", Priority::High);
    paint.status = SubTaskStatus::AwaitingApproval;
    paint.requires_client_approval = true;
    paint.estimate_hours = Some(2.0);
    paint.price_impact = Some(8_500.0);
    paint.eta_impact_days = Some(3);
    paint.decision_prompt = Some("Please select the final paint shade for your Mustang.".to_string());
    paint.decision_options = ["Candy Apple Red", "Wimbledon White", "Highland Green"]
        .into_iter()
        .map(|name| DecisionOption {
            name: name.to_string(),
            description: None,
            image_url: None,
        })
        .collect();

    let mut engine = scheduled(
        SubTask::new("en3", "Engine Assembly (351W)", Priority::High),
        now,
        "ruan",
        Some((-1, 4)),
    );
    engine.status = SubTaskStatus::InProgress;
    engine.estimate_hours = Some(24.0);
    engine.actual_hours = Some(18.0);
    engine.parts = vec![
        part("part-1", "en3", "Piston Ring Set", PartStatus::Received),
        part("part-2", "en3", "High Volume Oil Pump", PartStatus::Ordered),
    ];

    let mut coilovers = scheduled(
        SubTask::new("cs2", "Upgrade to Coilover Suspension", Priority::High),
        now,
        "dj",
        None,
    );
    coilovers.status = SubTaskStatus::AwaitingApproval;
    coilovers.requires_client_approval = true;
    coilovers.estimate_hours = Some(12.0);
    coilovers.price_impact = Some(22_000.0);
    coilovers.eta_impact_days = Some(5);

    Project {
        id: "mustang-1969-smith".to_string(),
        customer_name: "John Smith".to_string(),
        vehicle: vehicle("Ford", "Mustang Mach 1", 1969, Some("9R02R154875")),
        status: ProjectStatus::Active,
        hold_reason: None,
        created_at: now - Duration::days(45),
        promised_date: Some(now + Duration::days(60)),
        categories: vec![
            category("bp", "Body & Paint", 30.0, vec![blasting, rust, filler, primer, paint]),
            category("en", "Engine & Drivetrain", 40.0, vec![engine]),
            category("cs", "Chassis & Suspension", 30.0, vec![coilovers]),
        ],
        timeline: vec![timeline(
            "t1",
            date(now, -4),
            "Engine block returned from machine shop.",
            "Engine & Drivetrain",
        )],
        media: vec![
            media("media-mustang-1", "gallery-01-arrival.jpg", "Initial state upon arrival.", "Body & Paint", false),
            media("media-mustang-2", "gallery-02-engine-machined.jpg", "Engine block after machining.", "Engine & Drivetrain", true),
            media("media-mustang-3", "gallery-03-wheel-fitment.jpg", "Test fitting the new wheels.", "Chassis & Suspension", false),
        ],
        messages: Vec::new(),
        financials: Financials {
            total_quoted: 75_000.0,
            total_paid: 37_500.0,
            invoices: vec![
                invoice("inv-1", "Project Deposit (50%)", 37_500.0, InvoiceStatus::Paid, date(now, -45)),
                invoice("inv-2", "Final Payment", 37_500.0, InvoiceStatus::Pending, date(now, 60)),
            ],
        },
    }
}

fn camaro(now: DateTime<Utc>) -> Project {
    let strip = completed(
        scheduled(SubTask::new("cam-int1", "Strip Interior", Priority::Normal), now, "moses", None),
        now,
        10,
        8.0,
    );
    let deadening = completed(
        scheduled(
            SubTask::new("cam-int2", "Install Sound Deadening", Priority::Normal),
            now,
            "nico",
            None,
        ),
        now,
        5,
        16.0,
    );
    let wiring = scheduled(
        SubTask::new("cam-int3", "Dash and Wiring", Priority::High),
        now,
        "thabo",
        Some((1, 7)),
    );

    Project {
        id: "camaro-1969-davis".to_string(),
        customer_name: "Robert Davis".to_string(),
        vehicle: vehicle("Chevrolet", "Camaro Z/28", 1969, None),
        status: ProjectStatus::Active,
        hold_reason: None,
        created_at: now - Duration::days(15),
        promised_date: Some(now + Duration::days(75)),
        categories: vec![category(
            "cam-int",
            "Interior Restoration",
            50.0,
            vec![strip, deadening, wiring],
        )],
        timeline: vec![timeline(
            "t7",
            date(now, -15),
            "New project \"1969 Camaro Z/28\" has been checked in.",
            "Project Start",
        )],
        media: Vec::new(),
        messages: Vec::new(),
        financials: Financials {
            total_quoted: 120_000.0,
            total_paid: 60_000.0,
            invoices: vec![invoice(
                "inv-7",
                "Project Deposit (50%)",
                60_000.0,
                InvoiceStatus::Paid,
                date(now, -15),
            )],
        },
    }
}

fn charger(now: DateTime<Utc>) -> Project {
    let trim = completed(
        scheduled(SubTask::new("fa1", "Install chrome trim", Priority::High), now, "ruan", None),
        now,
        10,
        15.0,
    );
    let vinyl = completed(
        scheduled(SubTask::new("fa2", "Install vinyl top", Priority::Normal), now, "dean", None),
        now,
        8,
        9.0,
    );

    Project {
        id: "charger-1968-chen".to_string(),
        customer_name: "David Chen".to_string(),
        vehicle: vehicle("Dodge", "Charger R/T", 1968, None),
        status: ProjectStatus::Completed,
        hold_reason: None,
        created_at: now - Duration::days(60),
        promised_date: Some(now - Duration::days(5)),
        categories: vec![category("fa", "Final Assembly", 100.0, vec![trim, vinyl])],
        timeline: vec![timeline(
            "t4",
            date(now, -5),
            "Project complete and ready for customer pickup.",
            "Project Status",
        )],
        media: Vec::new(),
        messages: Vec::new(),
        financials: Financials {
            total_quoted: 45_000.0,
            total_paid: 45_000.0,
            invoices: vec![invoice(
                "inv-5",
                "Full Project Payment",
                45_000.0,
                InvoiceStatus::Paid,
                date(now, -60),
            )],
        },
    }
}

fn vehicle(make: &str, model: &str, year: i32, vin: Option<&str>) -> Vehicle {
    Vehicle {
        make: make.to_string(),
        model: model.to_string(),
        year,
        vin: vin.map(str::to_string),
        color: None,
        mileage_in: None,
        mileage_out: None,
    }
}

fn category(id: &str, name: &str, weight: f64, sub_tasks: Vec<SubTask>) -> Category {
    Category {
        id: id.to_string(),
        name: name.to_string(),
        weight,
        sub_tasks,
        requires_qa: false,
        owner: None,
    }
}

fn part(id: &str, task_id: &str, name: &str, status: PartStatus) -> Part {
    Part {
        id: id.to_string(),
        task_id: task_id.to_string(),
        name: name.to_string(),
        part_number: None,
        supplier: None,
        qty: 1,
        unit_cost: None,
        status,
        eta: None,
    }
}

fn invoice(
    id: &str,
    description: &str,
    amount: f64,
    status: InvoiceStatus,
    due_date: NaiveDate,
) -> Invoice {
    Invoice {
        id: id.to_string(),
        description: description.to_string(),
        amount,
        status,
        due_date,
    }
}

fn timeline(id: &str, date: NaiveDate, update: &str, category: &str) -> TimelineUpdate {
    TimelineUpdate {
        id: id.to_string(),
        date,
        update: update.to_string(),
        category: category.to_string(),
    }
}

fn media(id: &str, file: &str, caption: &str, category: &str, is_featured: bool) -> Media {
    Media {
        id: id.to_string(),
        url: format!("/images/projects/mustang-1969-smith/{file}"),
        caption: caption.to_string(),
        category: category.to_string(),
        is_featured,
    }
}
