use chrono::NaiveDate;
use serde::Serialize;

pub const PRAYERS_PER_DAY: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Accepts the stored codes (`L`, `P`) and the long labels.
    pub fn parse(raw: &str) -> Option<Gender> {
        let t = raw.trim();
        if t.eq_ignore_ascii_case("L") || t.eq_ignore_ascii_case("Laki-laki") {
            Some(Gender::Male)
        } else if t.eq_ignore_ascii_case("P") || t.eq_ignore_ascii_case("Perempuan") {
            Some(Gender::Female)
        } else {
            None
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Gender::Male => "L",
            Gender::Female => "P",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Gender::Male => "Laki-laki",
            Gender::Female => "Perempuan",
        }
    }

    /// Short form used in export file names.
    pub fn file_tag(self) -> &'static str {
        match self {
            Gender::Male => "Laki",
            Gender::Female => "Perempuan",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prayer {
    Subuh,
    Dzuhur,
    Ashar,
    Maghrib,
    Isya,
}

impl Prayer {
    pub const ALL: [Prayer; 5] = [
        Prayer::Subuh,
        Prayer::Dzuhur,
        Prayer::Ashar,
        Prayer::Maghrib,
        Prayer::Isya,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Prayer::Subuh => "subuh",
            Prayer::Dzuhur => "dzuhur",
            Prayer::Ashar => "ashar",
            Prayer::Maghrib => "maghrib",
            Prayer::Isya => "isya",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Prayer::Subuh => "Subuh",
            Prayer::Dzuhur => "Dzuhur",
            Prayer::Ashar => "Ashar",
            Prayer::Maghrib => "Maghrib",
            Prayer::Isya => "Isya",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrayerFlags {
    pub subuh: bool,
    pub dzuhur: bool,
    pub ashar: bool,
    pub maghrib: bool,
    pub isya: bool,
}

impl PrayerFlags {
    pub fn get(&self, prayer: Prayer) -> bool {
        match prayer {
            Prayer::Subuh => self.subuh,
            Prayer::Dzuhur => self.dzuhur,
            Prayer::Ashar => self.ashar,
            Prayer::Maghrib => self.maghrib,
            Prayer::Isya => self.isya,
        }
    }

    pub fn set(&mut self, prayer: Prayer, done: bool) {
        match prayer {
            Prayer::Subuh => self.subuh = done,
            Prayer::Dzuhur => self.dzuhur = done,
            Prayer::Ashar => self.ashar = done,
            Prayer::Maghrib => self.maghrib = done,
            Prayer::Isya => self.isya = done,
        }
    }

    pub fn completed(&self) -> u32 {
        Prayer::ALL.iter().filter(|p| self.get(**p)).count() as u32
    }

    pub fn missed(&self) -> u32 {
        PRAYERS_PER_DAY - self.completed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRef {
    pub id: String,
    pub name: String,
    pub gender: Gender,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub id: String,
    pub student: StudentRef,
    pub date: NaiveDate,
    pub flags: PrayerFlags,
    pub updated_at: Option<String>,
}

impl AttendanceRecord {
    pub fn to_json(&self) -> serde_json::Value {
        let mut v = serde_json::json!({
            "id": self.id,
            "studentId": self.student.id,
            "name": self.student.name,
            "gender": self.student.gender.code(),
            "genderLabel": self.student.gender.label(),
            "date": self.date.format("%Y-%m-%d").to_string(),
            "completed": self.flags.completed(),
            "updatedAt": self.updated_at,
        });
        for p in Prayer::ALL {
            v[p.key()] = serde_json::Value::Bool(self.flags.get(p));
        }
        v
    }
}
