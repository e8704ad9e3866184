use std::sync::Mutex;

use solstice_biomes::Season;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CalendarState {
    pub season: Season,
    /// 1-based day within `season`.
    pub day: u32,
    pub season_length: u32,
}

impl CalendarState {
    pub fn new(season: Season, day: u32, season_length: u32) -> Self {
        Self {
            season,
            day,
            season_length,
        }
    }

    /// `day` clamped into `1..=season_length`.
    #[inline]
    pub fn day_in_season(&self) -> u32 {
        self.day.clamp(1, self.season_length.max(1))
    }

    #[inline]
    pub fn next_season(&self) -> Season {
        self.season.next()
    }
}

/// Source of the current season. Implemented by the host's day-advance
/// state machine.
pub trait Calendar: Send + Sync {
    fn state(&self) -> CalendarState;

    fn current_season(&self) -> Season {
        self.state().season
    }

    fn day_in_season(&self) -> u32 {
        self.state().day_in_season()
    }

    fn season_length(&self) -> u32 {
        self.state().season_length.max(1)
    }
}

/// A calendar advanced explicitly by its owner.
pub struct FixedCalendar {
    state: Mutex<CalendarState>,
}

impl FixedCalendar {
    pub fn new(state: CalendarState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn set(&self, state: CalendarState) {
        *self.state.lock().unwrap() = state;
    }

    /// Moves one day forward. Returns `true` when this rolled into a new season.
    pub fn advance_day(&self) -> bool {
        let mut st = self.state.lock().unwrap();
        if st.day >= st.season_length.max(1) {
            st.day = 1;
            st.season = st.season.next();
            true
        } else {
            st.day += 1;
            false
        }
    }
}

impl Calendar for FixedCalendar {
    fn state(&self) -> CalendarState {
        *self.state.lock().unwrap()
    }
}
