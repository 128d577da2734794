//! Prompt text for the four question kinds.
//!
//! Every prompt is assembled in the same order: run preamble, input
//! explanation, fenced payload, task description, answer format. The
//! JSON keys named here are contracts; the reply parsers expect them
//! verbatim.

/// Opening line of every prompt.
pub fn preamble(app_name: &str, description: &str) -> String {
    format!("I'm now testing an app called {app_name} on Android.\n{description}\n")
}

// ---------------------------------------------------------------------
// Overview
// ---------------------------------------------------------------------

pub const FUNCTION_EXPLANATION: &str = "
An app's page contains many controls that display information to users and provide interactive interfaces.
Users interact with the controls to perform a \"Function\", such as navigating to another tab by clicking a navigation bar icon or opening the settings page.
";

pub const OVERVIEW_INPUT: &str = "
I will provide an HTML description of an app's page, including its components and their structural information.
The description uses five HTML tags, namely <button>, <checkbox>, <scroller>, <input>, and <p>, which represent elements that can be clicked, checked, swiped, edited, and any other views respectively.
Each HTML element has the following attributes:
id (the unique id of this component), class (the class name of this component), resource-id (the resource-id of this Android component), content-desc (the content description of this component), text (the text of this component), direction (if this component is scrollable, indicating its scroll direction), value (the text that has been input to the text box).
";

pub const OVERVIEW_TASKS: &str = "
Based on the HTML description of this page, your tasks are:

1. Page Overview: Summarize the current page, concluding what kind of information the page mainly presents to users and what it is primarily used for.
2. Function Analysis: Identify the functions present on the page, listing their corresponding element IDs, prioritized by importance. A function's importance increases if it triggers a new page or results in more code being executed. Specifically:
    - Navigation-related functions are crucial. They correspond to buttons usually located in menus, navigation drawers, or tabs, used to switch between pages. Such buttons usually sit at the top or bottom of the page, appear in groups (possibly wrapped in a ScrollView), share the same class and similar resource-id attributes (often containing \"tab\"), and carry short, general text.
    - Functions central to the page's main purpose, like video playback on a video page (play, like, subscribe, comment) or settings adjustments on a settings page.
    - Any other functions you believe could trigger new pages or enhance code coverage.
";

pub const OVERVIEW_TASKS_WITH_RANKING: &str = "
Based on the HTML description of this page, your tasks are:

1. Page Overview: Summarize the current page, concluding what kind of information the page mainly presents to users and what it is primarily used for.
2. Function Analysis: Identify the functions present on the page, listing their corresponding element IDs, prioritized by importance. A function's importance increases if it triggers a new page or results in more code being executed. Specifically:
    - Navigation-related functions are crucial. They correspond to buttons usually located in menus, navigation drawers, or tabs, used to switch between pages. Such buttons usually sit at the top or bottom of the page, appear in groups (possibly wrapped in a ScrollView), share the same class and similar resource-id attributes (often containing \"tab\"), and carry short, general text.
    - Functions central to the page's main purpose, like video playback on a video page (play, like, subscribe, comment) or settings adjustments on a settings page.
    - Any other functions you believe could trigger new pages or enhance code coverage.
3. Page Importance Ranking: Assess this page's significance relative to the entire app, considering its content and functions in relation to the app's category and main functions. I will also provide descriptions and function lists for five other pages; compare their importance with the current one and rank the top five most important pages.
";

pub const OVERVIEW_SUMMARY: &str = "
In summary, your response should include:

1. A concise summary of the page, within 30 words.
2. A list of the page's functions, including their element IDs, sorted by importance.
";

pub const OVERVIEW_SUMMARY_WITH_RANKING: &str = "
In summary, your response should include:

1. A concise summary of the page provided in the HTML description, within 30 words.
2. A list of the page's functions, including their element IDs, sorted by importance. If you believe the current page is empty or has no function, you can return an empty function list.
3. A ranking of the top five most important pages among the current and the other five pages.
";

pub const OVERVIEW_FORMAT: &str = "
Your answer should be in json form. Here are the key elements to include:
- \"Overview\": A string that provides a summary of the page.
- \"Function List\": An object of key-value pairs listing the functions in order of importance. The key is a string describing the function; the value is an integer element ID taken from the 'id' attribute in the HTML description.
Note that the keys must not be changed!
An example is given below, where \"navigate to 'News'\" and \"navigate to 'My'\" are the navigation-related functions you believed.
{
  \"Overview\": \"Main page of the app, providing buttons to navigate to other tabs, and functions for searching and playing videos.\",
  \"Function List\": {
    \"navigate to 'News'\": 29,
    \"navigate to 'My'\": 28,
    \"play a video\": 15
  }
}
";

pub const OVERVIEW_FORMAT_WITH_RANKING: &str = "
Your answer should be in json form. Here are the key elements to include:
- \"Overview\": A string that provides a summary of the page.
- \"Function List\": An object of key-value pairs listing the functions in order of importance. The key is a string describing the function; the value is an integer element ID taken from the 'id' attribute in the HTML description.
- \"Top5\": An array of integers indicating the indices of the top five most important pages, where the index is the number behind \"State\".
Note that the keys must not be changed!
An example is given below, where \"navigate to 'News'\" and \"navigate to 'My'\" are the navigation-related functions you believed.
{
  \"Overview\": \"Main page of the app, providing buttons to navigate to other tabs, and functions for searching and playing videos.\",
  \"Function List\": {
    \"navigate to 'News'\": 29,
    \"navigate to 'My'\": 28,
    \"play a video\": 15
  },
  \"Top5\": [1, 3, 2, 7, 4]
}
";

// ---------------------------------------------------------------------
// Guidance
// ---------------------------------------------------------------------

pub const GUIDANCE_INPUT: &str = "
After a period of testing, we have identified some pages (referred to as States below) and had you analyze their roles and functionalities. Based on this, I also asked you to rank these States by their importance to the overall app.
Below is a list of States you ranked from highest to lowest importance. Each State includes its Overview and FunctionList, with FunctionList containing the five most important untested functions of that State.
";

pub const GUIDANCE_TASK: &str = "
Based on the information above, please decide: which State should we go to next, and what function would be most appropriate to test in the target State?
Your main objective is to explore new pages and enhance code coverage by executing this function.
Specifically, follow these strategies:
1. Do not select a function that has been chosen before:";

pub const GUIDANCE_STRATEGIES: &str = "
2. Do not choose functions related to login or registration.
3. Prioritize choosing functions related to navigation.
4. Choose other functions which can trigger transitions or lead to undiscovered pages.
5. If there are no navigation-related functions, choose a core function from the higher-ranked pages, like video playback on a video page (play, like, subscribe, comment) or settings adjustments on a settings page.
";

pub const GUIDANCE_FORMAT: &str = "
Your answer should be in json form. Here are the key elements to include:
- \"Target State\": The State you want to go to, which contains the functionality you want to test.
- \"Target Function\": The function you want to test in the \"Target State\". This function must be chosen from the provided \"Function List\" of the corresponding State and cannot be made up.

Please note that the keys must not be changed. You should only give me one choice!
Your final output should only contain the json result and no more. An example is given below:
{
    \"Target State\": \"State2\",
    \"Target Function\": \"navigate to 'News'\"
}
";

// ---------------------------------------------------------------------
// Test function
// ---------------------------------------------------------------------

pub const TEST_INPUT: &str = "
The app's current page is provided using HTML, including its components and their structural information.
The description uses five HTML tags, namely <button>, <checkbox>, <scroller>, <input>, and <p>, which represent elements that can be clicked, checked, swiped, edited, and any other views respectively.
Each HTML element has the following attributes:
id (the unique id of this component), class (the class name of this component), resource-id (the resource-id of this Android component), content-desc (the content description of this component), text (the text of this component), direction (if this component is scrollable, indicating its scroll direction), value (the text that has been input to the text box).
";

pub const TEST_TASK: &str = "
What action should I perform next to test the target function?
";

pub const TEST_FORMAT: &str = "
Your response should include the selected element's id and the action to be performed on that element.
The available types of actions are: click (0), long press (1), swipe from top to bottom (2), swipe from bottom to top (3), swipe from left to right (4), swipe from right to left (5) and input text (6).
Your answer should be in json form.
The key \"Element Id\" is the value of the id attribute of the element you have chosen in the HTML description.
The key \"Action Type\" is the type of action to perform on the element; use the number in the parentheses of the action type.
The key \"Input\" is the text you want to input to the target element, generated by you. This key is only needed when the value of \"Action Type\" is 6.
If you believe the target function is finished testing and no more action is needed, the value of \"Element Id\" should be -1 and the value of \"Action Type\" should be 0.
Please note that the keys must not be changed. The output should be a pure json string starting with \"{\", NOT beginning with \"```json\", and must not contain comments.
An example is given below; it indicates that you selected the 2nd element and performed action 4 on it, a swipe from left to right.
{
    \"Element Id\": 2,
    \"Action Type\": 4
}
Another example demonstrates the situation that requires input; it indicates that you selected the 13th element and input \"apple\" into it.
{
    \"Element Id\": 13,
    \"Action Type\": 6,
    \"Input\": \"apple\"
}
";

pub const TEST_FORMAT_SATISFIED: &str = "
If you believe that the current page is the page that should be reached after executing the target function, or the current page lacks the element needed to complete the target function, respond with:
{
    \"Element Id\": -1,
    \"Action Type\": 0
}
";

// ---------------------------------------------------------------------
// Reanalysis
// ---------------------------------------------------------------------

pub const REANALYSIS_INPUT1: &str = "
You have previously analyzed a page and summarized its Overview and Function List.
";

pub const REANALYSIS_INPUT2: &str = "
Now you are provided with a set of similar pages containing controls not present in the previous page. Your task is to analyze the potential functions corresponding to these controls.

The controls are provided in HTML format, using five HTML tags: <button>, <checkbox>, <scroller>, <input>, and <p>, which represent elements that can be clicked, checked, swiped, edited, and other views respectively.
Each HTML element has the following attributes: id (the unique ID of this component), class (the class name of this component), resource-id (the resource ID of this Android component), content-desc (the content description of this component), text (the text of this component), direction (if this component is scrollable, indicating its scroll direction), value (the text that has been input to the text box).
";

pub const REANALYSIS_TASK: &str = "
Based on the HTML components, the page's Overview, and the existing Function List, your tasks are:

1. Analyze the functions corresponding to the controls that have an id attribute. Cross-reference these functions with the existing function list, prioritizing matches to ensure consistency.
2. Rank the importance of these functions. A function's importance increases if it triggers a new page or results in more code being executed. Specifically:
    - Navigation-related functions are crucial.
    - Functions central to the page's main purpose, such as video playback on a video page (play, like, subscribe, comment) or settings adjustments on a settings page.
    - Any other functions you believe could trigger new pages or enhance code coverage.
";

pub const REANALYSIS_FORMAT: &str = "
You should always respond using the correct JSON format.
The key is the control's `id` attribute, which must be a string representation of an integer.
The value is the corresponding function of that control.
The closer a key-value pair is to the top, the higher the importance of its function.
If there is no `id` attribute in the html controls, just return an empty json.
Please note that the output should be a pure json string starting with \"{\", NOT beginning with \"```json\", and must not contain comments.

An example is given below; it indicates that control 5 has the function \"navigate to 'News'\" and ranks highest in importance, control 3 has the function \"navigate to 'My'\" as the second highest, control 9 has the function \"play a video\", and so on.
{
    \"5\": \"navigate to 'News'\",
    \"3\": \"navigate to 'My'\",
    \"9\": \"play a video\"
}
";
